//! Removal of previously mirrored subtrees before a session starts

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::DestinationMapping;

/// Outcome of a cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Mirror roots that existed and were removed
    pub removed: Vec<PathBuf>,
    /// Mirror roots that were already absent
    pub absent: Vec<PathBuf>,
    /// Failures, as `(mirror root, message)`
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanReport {
    /// Whether every pair was cleaned or already clean
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes stale mirrors so nothing from a prior run lingers
pub struct MirrorCleaner;

impl MirrorCleaner {
    /// Remove `destination/<marker>` for every destination and mapping
    ///
    /// Runs sequentially and never fails: a missing subtree counts as
    /// clean, other errors are logged and recorded in the report.
    #[must_use]
    pub fn clean(destinations: &[PathBuf], mappings: &[DestinationMapping]) -> CleanReport {
        let mut report = CleanReport::default();

        for destination in destinations {
            for mapping in mappings {
                let target = mapping.mirror_root(destination);
                match Self::remove_subtree(destination, &target) {
                    Ok(true) => {
                        info!(path = %target.display(), "Cleaned mirror");
                        report.removed.push(target);
                    }
                    Ok(false) => {
                        debug!(path = %target.display(), "Mirror already clean");
                        report.absent.push(target);
                    }
                    Err(e) => {
                        warn!(path = %target.display(), error = %e, "Failed to clean mirror");
                        report.failed.push((target, e.to_string()));
                    }
                }
            }
        }

        report
    }

    /// Remove `target`, which must lie strictly below `destination`
    ///
    /// Returns `Ok(false)` when there was nothing to remove.
    fn remove_subtree(destination: &Path, target: &Path) -> std::io::Result<bool> {
        if target == destination || !target.starts_with(destination) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "refusing to remove {} outside {}",
                    target.display(),
                    destination.display()
                ),
            ));
        }

        let metadata = match fs::symlink_metadata(target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(target)
        } else {
            fs::remove_file(target)
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
