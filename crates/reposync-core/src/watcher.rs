//! Polling filesystem watcher
//!
//! One watcher runs per source root as a tokio task. It rescans the tree
//! on a fixed cadence, diffs each scan against what it has already
//! reported and sends the result down a bounded channel, so a slow
//! consumer simply slows the watcher down. The consumer sees:
//!
//! - `Change` events, in the order they were detected
//! - a single `Ready` marker after the last initial-scan event
//! - `Error`s, which are informational unless the failure policy says
//!   otherwise
//!
//! Files are only reported once their size and mtime have held still for
//! the stability threshold, and a file that disappears and comes back
//! within the atomic window is reported as one change.

mod snapshot;
mod state;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

pub use snapshot::{EntryKind, Fingerprint, Snapshot, scan, stat};
pub use state::PollState;

use crate::config::{WatchSettings, WatcherFailurePolicy};
use crate::ignore_rules::IgnoreSpec;

/// Capacity of the per-root event channel
const CHANNEL_CAPACITY: usize = 1024;

/// Kind of change detected under a source root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A file appeared and is stable
    FileAdded,
    /// A known file's content settled on a new state
    FileChanged,
    /// A known file is gone
    FileRemoved,
    /// A directory appeared
    DirAdded,
    /// A known directory is gone
    DirRemoved,
}

impl ChangeKind {
    /// Whether the event concerns a directory
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::DirAdded | Self::DirRemoved)
    }

    /// Short label for log lines
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FileAdded => "added",
            Self::FileChanged => "changed",
            Self::FileRemoved => "removed",
            Self::DirAdded => "directory added",
            Self::DirRemoved => "directory removed",
        }
    }
}

/// A single change under a source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub kind: ChangeKind,
    /// Absolute path of the affected entry
    pub path: PathBuf,
    /// Root the path was found under
    pub source_root: PathBuf,
}

/// Failures reported by a watcher
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The source root itself cannot be listed
    #[error("Source root {path} is unavailable: {source}")]
    RootUnavailable {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A subtree below the root could not be read
    #[error("Failed to read {path}: {message}")]
    Traversal {
        /// Path that failed
        path: PathBuf,
        /// Reason reported by the walk
        message: String,
    },
}

impl WatchError {
    /// Whether the whole root is affected
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::RootUnavailable { .. })
    }
}

/// Item in a watcher's event sequence
#[derive(Debug)]
pub enum WatchEvent {
    /// A change to mirror
    Change(ChangeEvent),
    /// All initial-scan events have been sent
    Ready,
    /// Something went wrong; see [`WatchError::is_fatal`]
    Error(WatchError),
}

/// Timing and traversal options for a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Full rescan cadence
    pub poll_interval: Duration,
    /// Change-detection cadence for binary files
    pub binary_interval: Duration,
    /// How long size and mtime must hold still
    pub stability_threshold: Duration,
    /// Re-check cadence for unstable files
    pub stability_poll_interval: Duration,
    /// Window in which a vanished file may come back as one change
    pub atomic_window: Duration,
    /// Maximum depth below the root
    pub max_depth: usize,
    /// What to do when the root cannot be read
    pub failure_policy: WatcherFailurePolicy,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchSettings::default().to_options()
    }
}

impl WatchOptions {
    /// Cadence of the polling loop
    fn tick(&self) -> Duration {
        self.poll_interval
            .min(self.stability_poll_interval)
            .max(Duration::from_millis(1))
    }
}

/// Watcher for one source root
#[derive(Debug, Clone)]
pub struct Watcher {
    spec: Arc<IgnoreSpec>,
    options: WatchOptions,
}

impl Watcher {
    /// Watch `spec.root()`, pruning every ignored subtree
    #[must_use]
    pub fn new(spec: IgnoreSpec, options: WatchOptions) -> Self {
        Self {
            spec: Arc::new(spec),
            options,
        }
    }

    /// Root being watched
    #[must_use]
    pub fn root(&self) -> &Path {
        self.spec.root()
    }

    /// Start polling on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> WatchStream {
        let root = self.root().to_path_buf();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(self.run(tx));

        WatchStream {
            root,
            receiver: rx,
            task,
        }
    }

    async fn run(self, tx: mpsc::Sender<WatchEvent>) {
        let root = self.root().to_path_buf();
        let options = self.options;
        let mut state = PollState::new(&root, &options);
        let mut ticker = tokio::time::interval(options.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_full_scan: Option<Instant> = None;
        let mut root_down = false;

        debug!(root = %root.display(), ?options, "Watcher started");

        loop {
            ticker.tick().await;

            let full_due = last_full_scan
                .is_none_or(|last| last.elapsed() >= options.poll_interval);

            let events = if full_due {
                last_full_scan = Some(Instant::now());
                let spec = Arc::clone(&self.spec);
                let max_depth = options.max_depth;
                let scanned = tokio::task::spawn_blocking(move || scan(&spec, max_depth)).await;

                match scanned {
                    Ok(Ok(snapshot)) => {
                        if root_down {
                            info!(root = %root.display(), "Source root is available again");
                            root_down = false;
                        }
                        state.observe(&snapshot, Instant::now())
                    }
                    Ok(Err(err)) => {
                        let policy = options.failure_policy;
                        let first_failure = !root_down;
                        root_down = true;
                        if first_failure && tx.send(WatchEvent::Error(err)).await.is_err() {
                            return;
                        }
                        if policy != WatcherFailurePolicy::Continue {
                            debug!(root = %root.display(), ?policy, "Watcher stopping");
                            return;
                        }
                        continue;
                    }
                    Err(join_err) => vec![WatchEvent::Error(WatchError::Traversal {
                        path: root.clone(),
                        message: join_err.to_string(),
                    })],
                }
            } else if state.has_pending() {
                let paths = state.pending_paths();
                let stats = tokio::task::spawn_blocking(move || {
                    paths
                        .into_iter()
                        .map(|path| {
                            let fingerprint = stat(&path);
                            (path, fingerprint)
                        })
                        .collect::<Vec<_>>()
                })
                .await
                .unwrap_or_default();
                state.refresh(&stats, Instant::now())
            } else {
                continue;
            };

            for event in events {
                if let WatchEvent::Change(change) = &event {
                    trace!(path = %change.path.display(), kind = change.kind.label(), "Detected change");
                }
                if tx.send(event).await.is_err() {
                    // Consumer dropped the stream
                    return;
                }
            }
        }
    }
}

/// Lazy, ordered sequence of events from one watcher
///
/// Dropping the stream stops the watcher.
#[derive(Debug)]
pub struct WatchStream {
    root: PathBuf,
    receiver: mpsc::Receiver<WatchEvent>,
    task: JoinHandle<()>,
}

impl WatchStream {
    /// Root being watched
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next event, or `None` once the watcher has stopped
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.receiver.recv().await
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}
