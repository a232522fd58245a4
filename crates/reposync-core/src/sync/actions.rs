//! Sync action determination logic

use std::path::PathBuf;

use crate::watcher::ChangeKind;

/// Filesystem action to perform on one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy source bytes over the destination file
    Copy { source: PathBuf, dest: PathBuf },
    /// Create the destination directory if absent
    CreateDir { dest: PathBuf },
    /// Delete the destination file
    RemoveFile { dest: PathBuf },
    /// Delete the destination directory if present and empty
    RemoveDir { dest: PathBuf },
}

impl SyncAction {
    /// Action mirroring `kind` at `source` onto `dest`
    #[must_use]
    pub fn resolve(kind: ChangeKind, source: PathBuf, dest: PathBuf) -> Self {
        match kind {
            ChangeKind::FileAdded | ChangeKind::FileChanged => Self::Copy { source, dest },
            ChangeKind::FileRemoved => Self::RemoveFile { dest },
            ChangeKind::DirAdded => Self::CreateDir { dest },
            ChangeKind::DirRemoved => Self::RemoveDir { dest },
        }
    }

    /// Destination path the action touches
    #[must_use]
    pub fn dest(&self) -> &std::path::Path {
        match self {
            Self::Copy { dest, .. }
            | Self::CreateDir { dest }
            | Self::RemoveFile { dest }
            | Self::RemoveDir { dest } => dest,
        }
    }
}

/// What an action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// File bytes were written
    Copied,
    /// A directory was created
    DirCreated,
    /// A file or directory was deleted
    Removed,
    /// Nothing to do, with the reason
    Skipped(String),
}

/// Failure of one action on one destination
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Copying file bytes failed
    #[error("Failed to copy {source_path} to {dest}: {source}")]
    Copy {
        /// File being copied
        source_path: PathBuf,
        /// Destination file
        dest: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Creating a destination directory failed
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory being created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Deleting a destination entry failed
    #[error("Failed to remove {path}: {source}")]
    Remove {
        /// Entry being removed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Result of dispatching one event to one destination
#[derive(Debug)]
pub struct DestinationOutcome {
    /// Destination root
    pub destination: PathBuf,
    /// Path inside the destination, when one could be computed
    pub target: Option<PathBuf>,
    /// What happened
    pub result: Result<ActionStatus, ActionError>,
}

impl DestinationOutcome {
    /// Whether the action needed no work or succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
