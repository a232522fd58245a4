//! Per-destination execution of sync actions

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::actions::{ActionError, ActionStatus, DestinationOutcome, SyncAction};
use crate::mirror::DestinationMapping;
use crate::watcher::{ChangeEvent, ChangeKind};

/// Applies change events from one source root to every destination
#[derive(Debug, Clone)]
pub struct Dispatcher {
    mapping: DestinationMapping,
    destinations: Vec<PathBuf>,
}

impl Dispatcher {
    /// Create a dispatcher for one source root
    #[must_use]
    pub const fn new(mapping: DestinationMapping, destinations: Vec<PathBuf>) -> Self {
        Self {
            mapping,
            destinations,
        }
    }

    /// Mapping used to place files in each destination
    #[must_use]
    pub const fn mapping(&self) -> &DestinationMapping {
        &self.mapping
    }

    /// Apply `event` to every destination, in destination order
    ///
    /// Never fails as a whole: each destination gets its own outcome and
    /// a failure on one does not affect the rest.
    #[must_use]
    pub fn apply(&self, event: &ChangeEvent) -> Vec<DestinationOutcome> {
        let Some(relative) = event.path.strip_prefix(&event.source_root).ok() else {
            trace!(path = %event.path.display(), "Event outside its source root");
            return self.skip_all(None, "outside source root");
        };

        let copies = matches!(event.kind, ChangeKind::FileAdded | ChangeKind::FileChanged);
        if copies && !is_regular_file(&event.path) {
            trace!(path = %event.path.display(), "Source file vanished before copy");
            return self.skip_all(Some(relative), "source no longer exists");
        }

        self.destinations
            .iter()
            .map(|destination| {
                let target = self.mapping.target_for_relative(destination, relative);
                let action = SyncAction::resolve(event.kind, event.path.clone(), target.clone());
                let result = execute(&action);

                match &result {
                    Ok(ActionStatus::Skipped(reason)) => {
                        trace!(path = %target.display(), reason = %reason, "Skipped");
                    }
                    Ok(status) => {
                        debug!(path = %target.display(), ?status, "Applied {}", event.kind.label());
                    }
                    Err(err) => {
                        debug!(destination = %destination.display(), error = %err, "Destination update failed");
                    }
                }

                DestinationOutcome {
                    destination: destination.clone(),
                    target: Some(target),
                    result,
                }
            })
            .collect()
    }

    fn skip_all(&self, relative: Option<&Path>, reason: &str) -> Vec<DestinationOutcome> {
        self.destinations
            .iter()
            .map(|destination| DestinationOutcome {
                destination: destination.clone(),
                target: relative.map(|rel| self.mapping.target_for_relative(destination, rel)),
                result: Ok(ActionStatus::Skipped(reason.to_string())),
            })
            .collect()
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Execute one action against the filesystem
fn execute(action: &SyncAction) -> Result<ActionStatus, ActionError> {
    match action {
        SyncAction::Copy { source, dest } => copy_file(source, dest),
        SyncAction::CreateDir { dest } => {
            if dest.is_dir() {
                return Ok(ActionStatus::Skipped("directory exists".to_string()));
            }
            fs::create_dir_all(dest).map_err(|source| ActionError::CreateDir {
                path: dest.clone(),
                source,
            })?;
            Ok(ActionStatus::DirCreated)
        }
        SyncAction::RemoveFile { dest } => match fs::remove_file(dest) {
            Ok(()) => Ok(ActionStatus::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(ActionStatus::Skipped("already absent".to_string()))
            }
            Err(source) => Err(ActionError::Remove {
                path: dest.clone(),
                source,
            }),
        },
        SyncAction::RemoveDir { dest } => match fs::remove_dir(dest) {
            Ok(()) => Ok(ActionStatus::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(ActionStatus::Skipped("already absent".to_string()))
            }
            Err(source) => Err(ActionError::Remove {
                path: dest.clone(),
                source,
            }),
        },
    }
}

/// Copy file bytes, creating missing parents
fn copy_file(source: &Path, dest: &Path) -> Result<ActionStatus, ActionError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|err| ActionError::CreateDir {
            path: parent.to_path_buf(),
            source: err,
        })?;
    }

    match fs::copy(source, dest) {
        Ok(_) => Ok(ActionStatus::Copied),
        Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
            Ok(ActionStatus::Skipped("source no longer exists".to_string()))
        }
        Err(err) => Err(ActionError::Copy {
            source_path: source.to_path_buf(),
            dest: dest.to_path_buf(),
            source: err,
        }),
    }
}
