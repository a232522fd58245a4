//! Configuration types and structures

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::PathResolver;
use crate::watcher::WatchOptions;

/// What a watcher does after its source root becomes unreadable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherFailurePolicy {
    /// Log once, keep polling and pick up again when the root comes back
    #[default]
    Continue,
    /// Log once and stop watching that root
    Stop,
    /// Log once and end the session with an error
    Exit,
}

/// One configured instance: sources mirrored into destinations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InstanceConfig {
    /// Source directories to watch
    #[serde(default, alias = "fromDirectories")]
    pub sources: Vec<PathBuf>,

    /// Destination roots receiving the mirror
    #[serde(default, alias = "toDirectories")]
    pub destinations: Vec<PathBuf>,

    /// Sources whose own ignore files are not consulted
    #[serde(default, alias = "ignoreExempt")]
    pub ignore_exempt: Vec<PathBuf>,

    /// Fixed marker segment instead of each source's basename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// Polling and debounce timings, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Full rescan cadence
    pub poll_interval_ms: u64,
    /// Change-detection cadence for binary files
    pub binary_interval_ms: u64,
    /// How long size and mtime must stay unchanged
    pub stability_threshold_ms: u64,
    /// How often unstable files are re-checked
    pub stability_poll_ms: u64,
    /// Window in which a vanished file may reappear as a single change
    pub atomic_window_ms: u64,
    /// Maximum traversal depth below a source root
    pub max_depth: usize,
    /// Behaviour when a source root cannot be read
    pub on_error: WatcherFailurePolicy,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            binary_interval_ms: 300,
            stability_threshold_ms: 2000,
            stability_poll_ms: 100,
            atomic_window_ms: 100,
            max_depth: 99,
            on_error: WatcherFailurePolicy::Continue,
        }
    }
}

impl WatchSettings {
    /// Convert to the watcher's runtime options
    #[must_use]
    pub const fn to_options(&self) -> WatchOptions {
        WatchOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            binary_interval: Duration::from_millis(self.binary_interval_ms),
            stability_threshold: Duration::from_millis(self.stability_threshold_ms),
            stability_poll_interval: Duration::from_millis(self.stability_poll_ms),
            atomic_window: Duration::from_millis(self.atomic_window_ms),
            max_depth: self.max_depth,
            failure_policy: self.on_error,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Keep watching after the initial mirror pass
    #[serde(default)]
    pub continuous: bool,

    /// Configured instances, each run as its own sync group
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    /// Watcher timings shared by every instance
    #[serde(default)]
    pub watch: WatchSettings,
}

impl Config {
    /// Build one sync group per instance
    ///
    /// Exemption entries are matched against sources after both are
    /// resolved against the same base, so `./lib` exempts `lib`.
    #[must_use]
    pub fn groups(&self, resolver: &PathResolver) -> Vec<SyncGroup> {
        self.instances
            .iter()
            .enumerate()
            .map(|(idx, instance)| {
                let exempt: Vec<PathBuf> = instance
                    .ignore_exempt
                    .iter()
                    .map(|p| resolver.resolve_one(p))
                    .collect();

                let sources = instance
                    .sources
                    .iter()
                    .map(|path| SourceRoot {
                        ignore_exempt: exempt.contains(&resolver.resolve_one(path)),
                        path: path.clone(),
                    })
                    .collect();

                SyncGroup {
                    name: format!("instance {}", idx + 1),
                    sources,
                    destinations: instance.destinations.clone(),
                    continuous_watch: self.continuous,
                    marker: instance.marker.clone(),
                }
            })
            .collect()
    }
}

/// A watched source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    /// Directory as configured (may be relative)
    pub path: PathBuf,
    /// Skip `.gitignore`/`.reposyncignore` for this root
    pub ignore_exempt: bool,
}

impl SourceRoot {
    /// Source root that honours its ignore files
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore_exempt: false,
        }
    }

    /// Source root whose ignore files are skipped
    #[must_use]
    pub fn exempt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore_exempt: true,
        }
    }
}

/// One unit of work, immutable for the life of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroup {
    /// Label used in log lines
    pub name: String,
    /// Source roots in configured order
    pub sources: Vec<SourceRoot>,
    /// Destination roots in configured order
    pub destinations: Vec<PathBuf>,
    /// Keep watching after the initial pass
    pub continuous_watch: bool,
    /// Fixed marker segment, if any
    pub marker: Option<String>,
}

impl SyncGroup {
    /// Create a group from plain paths
    #[must_use]
    pub fn new<S, D>(sources: S, destinations: D, continuous_watch: bool) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<Path>,
        D: IntoIterator,
        D::Item: AsRef<Path>,
    {
        Self {
            name: "instance 1".to_string(),
            sources: sources
                .into_iter()
                .map(|p| SourceRoot::new(p.as_ref()))
                .collect(),
            destinations: destinations
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect(),
            continuous_watch,
            marker: None,
        }
    }
}
