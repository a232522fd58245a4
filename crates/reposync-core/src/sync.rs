//! Fan-out of source changes onto destination roots
//!
//! Each `ChangeEvent` becomes one `SyncAction` per destination. Actions
//! are executed independently: a failure on one destination is logged
//! and recorded but never stops the others.

mod actions;
mod executor;
mod reporting;

pub use actions::{ActionError, ActionStatus, DestinationOutcome, SyncAction};
pub use executor::Dispatcher;
pub use reporting::SyncReporter;

/// Synchronization result with statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Files copied (added or changed)
    pub copied: usize,
    /// Directories created
    pub dirs_created: usize,
    /// Files and directories removed
    pub removed: usize,
    /// Actions with nothing to do
    pub skipped: usize,
    /// Errors encountered, one line each
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Total operations performed
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.copied + self.dirs_created + self.removed
    }

    /// Whether sync was successful (no errors)
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold one destination outcome into the tally
    pub fn record(&mut self, outcome: &DestinationOutcome) {
        match &outcome.result {
            Ok(ActionStatus::Copied) => self.copied += 1,
            Ok(ActionStatus::DirCreated) => self.dirs_created += 1,
            Ok(ActionStatus::Removed) => self.removed += 1,
            Ok(ActionStatus::Skipped(_)) => self.skipped += 1,
            Err(err) => self.errors.push(err.to_string()),
        }
    }

    /// Add another tally to this one
    pub fn merge(&mut self, other: Self) {
        self.copied += other.copied;
        self.dirs_created += other.dirs_created;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod integration_tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::*;
    use crate::mirror::DestinationMapping;
    use crate::watcher::{ChangeEvent, ChangeKind};

    struct Fixture {
        _tmp: TempDir,
        source: PathBuf,
        dests: Vec<PathBuf>,
    }

    fn setup(dest_count: usize) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("widgets");
        fs::create_dir_all(&source).unwrap();
        let dests = (0..dest_count)
            .map(|i| {
                let dest = tmp.path().join(format!("dest{i}"));
                fs::create_dir_all(&dest).unwrap();
                dest
            })
            .collect();
        Fixture {
            _tmp: tmp,
            source,
            dests,
        }
    }

    fn dispatcher(fixture: &Fixture) -> Dispatcher {
        let mapping = DestinationMapping::new(&fixture.source, None).unwrap();
        Dispatcher::new(mapping, fixture.dests.clone())
    }

    fn event(fixture: &Fixture, kind: ChangeKind, rel: &str) -> ChangeEvent {
        let path = if rel.is_empty() {
            fixture.source.clone()
        } else {
            fixture.source.join(rel)
        };
        ChangeEvent {
            kind,
            path,
            source_root: fixture.source.clone(),
        }
    }

    fn create_test_file(dir: &Path, rel_path: &str, content: &str) {
        let path = dir.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn tally(outcomes: &[DestinationOutcome]) -> SyncResult {
        let mut result = SyncResult::default();
        for outcome in outcomes {
            result.record(outcome);
        }
        result
    }

    #[test]
    fn test_file_added_fans_out_to_every_destination() {
        let fx = setup(2);
        create_test_file(&fx.source, "src/button.js", "export default 1;");
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "src/button.js"));
        let result = tally(&outcomes);

        assert_eq!(result.copied, 2);
        assert!(result.is_success());
        for dest in &fx.dests {
            let copied = fs::read_to_string(dest.join("widgets/src/button.js")).unwrap();
            assert_eq!(copied, "export default 1;");
        }
    }

    #[test]
    fn test_file_changed_overwrites() {
        let fx = setup(1);
        create_test_file(&fx.source, "a.txt", "v2");
        create_test_file(&fx.dests[0], "widgets/a.txt", "v1 with more bytes");
        let dispatcher = dispatcher(&fx);

        dispatcher.apply(&event(&fx, ChangeKind::FileChanged, "a.txt"));

        let content = fs::read_to_string(fx.dests[0].join("widgets/a.txt")).unwrap();
        assert_eq!(content, "v2");
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let fx = setup(2);
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "gone.txt"));
        let result = tally(&outcomes);

        assert_eq!(result.skipped, 2);
        assert!(result.is_success());
        assert!(!fx.dests[0].join("widgets/gone.txt").exists());
    }

    #[test]
    fn test_file_removed() {
        let fx = setup(2);
        create_test_file(&fx.dests[0], "widgets/old.txt", "old");
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileRemoved, "old.txt"));
        let result = tally(&outcomes);

        assert_eq!(result.removed, 1);
        assert_eq!(result.skipped, 1);
        assert!(!fx.dests[0].join("widgets/old.txt").exists());
    }

    #[test]
    fn test_dir_added_creates_mirror_root_and_subdirs() {
        let fx = setup(1);
        let dispatcher = dispatcher(&fx);

        dispatcher.apply(&event(&fx, ChangeKind::DirAdded, ""));
        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::DirAdded, "lib/nested"));

        assert_eq!(tally(&outcomes).dirs_created, 1);
        assert!(fx.dests[0].join("widgets").is_dir());
        assert!(fx.dests[0].join("widgets/lib/nested").is_dir());

        // Already present
        let again = dispatcher.apply(&event(&fx, ChangeKind::DirAdded, "lib/nested"));
        assert_eq!(tally(&again).skipped, 1);
    }

    #[test]
    fn test_dir_removed_only_when_empty() {
        let fx = setup(2);
        fs::create_dir_all(fx.dests[0].join("widgets/empty")).unwrap();
        create_test_file(&fx.dests[1], "widgets/empty/local.txt", "kept");
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::DirRemoved, "empty"));

        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(!fx.dests[0].join("widgets/empty").exists());
        assert!(fx.dests[1].join("widgets/empty/local.txt").exists());
    }

    #[test]
    fn test_destination_failure_is_isolated() {
        let fx = setup(3);
        create_test_file(&fx.source, "index.js", "main");
        // A regular file where the first destination's mirror root should go
        fs::write(fx.dests[0].join("widgets"), "in the way").unwrap();
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "index.js"));
        let result = tally(&outcomes);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_err());
        assert_eq!(result.copied, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(fx.dests[1].join("widgets/index.js").exists());
        assert!(fx.dests[2].join("widgets/index.js").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_destination_is_isolated() {
        use std::os::unix::fs::PermissionsExt;

        let fx = setup(3);
        create_test_file(&fx.source, "index.js", "main");
        fs::set_permissions(&fx.dests[0], fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user
        let canary = fx.dests[0].join("canary");
        if fs::write(&canary, "").is_ok() {
            fs::remove_file(&canary).unwrap();
            fs::set_permissions(&fx.dests[0], fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let dispatcher = dispatcher(&fx);
        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "index.js"));
        let result = tally(&outcomes);
        fs::set_permissions(&fx.dests[0], fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_err());
        assert_eq!(result.copied, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(!fx.dests[0].join("widgets").exists());
        assert_eq!(
            fs::read_to_string(fx.dests[1].join("widgets/index.js")).unwrap(),
            "main"
        );
        assert!(fx.dests[2].join("widgets/index.js").exists());
    }

    #[test]
    fn test_outcomes_follow_destination_order() {
        let fx = setup(3);
        create_test_file(&fx.source, "a.txt", "a");
        let dispatcher = dispatcher(&fx);

        let outcomes = dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "a.txt"));
        let order: Vec<&Path> = outcomes.iter().map(|o| o.destination.as_path()).collect();
        let expected: Vec<&Path> = fx.dests.iter().map(PathBuf::as_path).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_event_outside_source_root_is_skipped() {
        let fx = setup(1);
        let dispatcher = dispatcher(&fx);
        let stray = ChangeEvent {
            kind: ChangeKind::FileAdded,
            path: PathBuf::from("/somewhere/else.txt"),
            source_root: fx.source.clone(),
        };

        let outcomes = dispatcher.apply(&stray);
        assert_eq!(tally(&outcomes).skipped, 1);
    }

    #[test]
    fn test_zero_destinations_is_a_no_op() {
        let fx = setup(0);
        create_test_file(&fx.source, "a.txt", "a");
        let dispatcher = dispatcher(&fx);

        assert!(dispatcher.apply(&event(&fx, ChangeKind::FileAdded, "a.txt")).is_empty());
    }

    #[test]
    fn test_result_merge() {
        let mut total = SyncResult {
            copied: 2,
            ..SyncResult::default()
        };
        total.merge(SyncResult {
            copied: 1,
            removed: 1,
            errors: vec!["boom".to_string()],
            ..SyncResult::default()
        });

        assert_eq!(total.copied, 3);
        assert_eq!(total.total_operations(), 4);
        assert!(!total.is_success());
    }

    #[test]
    fn test_sync_reporter() {
        let result = SyncResult {
            copied: 5,
            dirs_created: 3,
            skipped: 2,
            ..SyncResult::default()
        };

        let summary = SyncReporter::generate_summary(&result);

        assert!(summary.contains("Copied:      5"));
        assert!(summary.contains("Directories: 3"));
        assert!(summary.contains("Skipped:     2"));
        assert!(summary.contains("Total operations: 8"));
        assert!(summary.contains("✓ Success"));
    }

    #[test]
    fn test_sync_reporter_with_errors() {
        let mut result = SyncResult::default();
        result.copied = 1;
        result.errors.push("Test error".to_string());

        let summary = SyncReporter::generate_summary(&result);

        assert!(summary.contains("Errors (1)"));
        assert!(summary.contains("Test error"));
        assert!(summary.contains("✗ Completed with errors"));
        assert!(!result.is_success());
    }
}
