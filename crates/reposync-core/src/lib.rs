//! # reposync-core
//!
//! Watch-and-sync engine for the reposync tool.
//!
//! This library mirrors one or more source directory trees into one or
//! more destination roots and keeps them synchronized while the sources
//! change. Paths matched by ignore rules are never mirrored.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Core error types for the reposync library
pub mod error {
    /// Result type alias using `anyhow::Error`
    pub type Result<T> = anyhow::Result<T>;
}

/// Configuration file discovery, parsing and validation
pub mod config;

/// Ignore rule compilation and matching
pub mod ignore_rules;

/// Lexical path resolution for configured roots
pub mod paths;

/// Destination mapping and mirror cleaning
pub mod mirror;

/// Polling filesystem watcher
pub mod watcher;

/// Event-to-action dispatch onto destination roots
pub mod sync;

/// Session lifecycle for one sync group
pub mod session;

pub use config::{Config, SyncGroup, SourceRoot, WatcherFailurePolicy};
pub use ignore_rules::IgnoreSpec;
pub use mirror::{DestinationMapping, MirrorCleaner};
pub use session::{Phase, Session, SessionOptions, SessionOutcome};
pub use sync::{Dispatcher, SyncReporter, SyncResult};
pub use watcher::{ChangeEvent, ChangeKind, WatchEvent, WatchOptions, Watcher};
