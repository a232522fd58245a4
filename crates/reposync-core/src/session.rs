//! Session lifecycle for one sync group
//!
//! A session walks through `Discovering -> Cleaning -> Watching` and then
//! either terminates (one-shot and production runs) or settles into
//! `SteadyState` and keeps mirroring changes until the process is stopped.
//!
//! Every source root gets its own watcher task and its own pump task. The
//! pump applies events strictly in arrival order, so two changes to the
//! same path can never be applied out of order. Roots report milestones
//! back to the controller over a channel.


use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{SyncGroup, WatcherFailurePolicy};
use crate::error::Result;
use crate::ignore_rules::IgnoreSpec;
use crate::mirror::{DestinationMapping, MirrorCleaner};
use crate::paths::PathResolver;
use crate::sync::{Dispatcher, SyncReporter, SyncResult};
use crate::watcher::{WatchEvent, WatchOptions, WatchStream, Watcher};

/// Delay before the one-time "waiting for changes" line
const WAITING_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resolving configured paths
    Discovering,
    /// Removing stale mirrors
    Cleaning,
    /// Initial pass in progress
    Watching,
    /// At least one root finished its initial pass and is idle
    SteadyState,
    /// Session ended
    Terminated,
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// One-shot pass finished on every root
    Completed(SyncResult),
    /// Every watcher stopped while watching continuously
    Stopped(SyncResult),
}

/// Runtime options shared by every session in a process
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Watcher timings
    pub watch: WatchOptions,
    /// Force one-shot behaviour regardless of the group setting
    pub production: bool,
    /// Base directory for relative roots
    pub base_dir: PathBuf,
    /// Delay before "Waiting for changes..." is logged
    pub waiting_delay: Duration,
}

impl SessionOptions {
    /// Default options resolving relative roots against `base_dir`
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch: WatchOptions::default(),
            production: false,
            base_dir: base_dir.into(),
            waiting_delay: WAITING_DELAY,
        }
    }

    /// Use the given watcher timings
    #[must_use]
    pub const fn with_watch(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }

    /// Force one-shot behaviour
    #[must_use]
    pub const fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }
}

type SteadyHook = Arc<dyn Fn() + Send + Sync>;

/// Milestones reported by a root's pump task
#[derive(Debug)]
enum RootSignal {
    /// Initial pass applied
    Ready { root: PathBuf, result: SyncResult },
    /// Watcher ended; no more events for this root
    Ended { root: PathBuf, result: SyncResult },
    /// Fatal watcher error under the `exit` policy
    Failed { root: PathBuf, message: String },
}

/// A resolved source root ready to be watched
struct RootPlan {
    path: PathBuf,
    ignore_exempt: bool,
    mapping: DestinationMapping,
}

/// Aborts every per-root task when the session ends
struct RootTasks(Vec<JoinHandle<()>>);

impl Drop for RootTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Runs one sync group through its lifecycle
pub struct Session {
    group: SyncGroup,
    options: SessionOptions,
    phase: watch::Sender<Phase>,
    on_steady: Option<SteadyHook>,
}

impl Session {
    /// Create a session for `group`
    #[must_use]
    pub fn new(group: SyncGroup, options: SessionOptions) -> Self {
        let (phase, _) = watch::channel(Phase::Discovering);
        Self {
            group,
            options,
            phase,
            on_steady: None,
        }
    }

    /// Run `hook` once, after the first root reaches steady state
    #[must_use]
    pub fn with_steady_state_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_steady = Some(Arc::new(hook));
        self
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Follow phase transitions while the session runs
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: Phase) {
        debug!(group = %self.group.name, ?phase, "Session phase");
        self.phase.send_replace(phase);
    }

    /// Whether the session ends after the initial pass
    fn one_shot(&self) -> bool {
        !self.group.continuous_watch || self.options.production
    }

    /// Run the session to completion
    ///
    /// One-shot sessions return once every root has finished its initial
    /// pass. Continuous sessions only return when every watcher stops.
    ///
    /// # Errors
    ///
    /// Returns an error if a watcher fails under the `exit` policy or a
    /// worker task panics.
    pub async fn run(self) -> Result<SessionOutcome> {
        self.enter(Phase::Discovering);
        let (plans, destinations) = self.discover();

        self.enter(Phase::Cleaning);
        let mappings: Vec<DestinationMapping> = plans.iter().map(|p| p.mapping.clone()).collect();
        let clean_dests = destinations.clone();
        let report = tokio::task::spawn_blocking(move || MirrorCleaner::clean(&clean_dests, &mappings))
            .await
            .context("Mirror cleaner task failed")?;
        if !report.is_success() {
            warn!(
                group = %self.group.name,
                failed = report.failed.len(),
                "Some mirrors could not be cleaned"
            );
        }

        self.enter(Phase::Watching);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = RootTasks(Vec::new());
        let mut expected = 0usize;

        for plan in plans {
            let spec = match IgnoreSpec::compile(&plan.path, plan.ignore_exempt) {
                Ok(spec) => spec,
                Err(e) => {
                    error!(root = %plan.path.display(), error = %e, "Failed to compile ignore rules");
                    continue;
                }
            };

            let stream = Watcher::new(spec, self.options.watch).spawn();
            let dispatcher = Arc::new(Dispatcher::new(plan.mapping, destinations.clone()));
            let pump = Pump {
                policy: self.options.watch.failure_policy,
                one_shot: self.one_shot(),
                signals: tx.clone(),
            };
            tasks.0.push(tokio::spawn(pump.run(stream, dispatcher)));
            expected += 1;
        }
        drop(tx);

        let outcome = self.supervise(&mut rx, expected).await;
        self.enter(Phase::Terminated);
        drop(tasks);
        outcome
    }

    /// Resolve sources and destinations into watch plans
    fn discover(&self) -> (Vec<RootPlan>, Vec<PathBuf>) {
        let resolver = PathResolver::new(&self.options.base_dir);
        let sources = resolver.resolve("source", self.group.sources.iter().map(|s| &s.path));
        let destinations =
            resolver.resolve("destination", self.group.destinations.iter());

        let exempt: HashSet<PathBuf> = self
            .group
            .sources
            .iter()
            .filter(|s| s.ignore_exempt)
            .map(|s| resolver.resolve_one(&s.path))
            .collect();

        let mut seen = HashSet::new();
        let mut markers = HashSet::new();
        let mut plans = Vec::with_capacity(sources.len());
        for path in sources {
            if !seen.insert(path.clone()) {
                warn!(root = %path.display(), "Source listed more than once; watching it once");
                continue;
            }
            let Some(mapping) = DestinationMapping::new(&path, self.group.marker.as_deref()) else {
                error!(root = %path.display(), "Source root has no usable marker segment");
                continue;
            };
            if !markers.insert(mapping.marker().to_string()) {
                warn!(
                    root = %path.display(),
                    marker = mapping.marker(),
                    "Marker shared with another source; the last write wins"
                );
            }
            plans.push(RootPlan {
                ignore_exempt: exempt.contains(&path),
                path,
                mapping,
            });
        }

        (plans, destinations)
    }

    async fn supervise(
        &self,
        rx: &mut mpsc::UnboundedReceiver<RootSignal>,
        expected: usize,
    ) -> Result<SessionOutcome> {
        let one_shot = self.one_shot();
        let mut total = SyncResult::default();
        let mut settled: HashSet<PathBuf> = HashSet::new();
        let mut ended = 0usize;
        let mut steady = 0usize;

        if one_shot && expected == 0 {
            info!(group = %self.group.name, "Nothing to sync");
            return Ok(SessionOutcome::Completed(total));
        }

        while let Some(signal) = rx.recv().await {
            match signal {
                RootSignal::Ready { root, result } => {
                    total.merge(result);
                    settled.insert(root.clone());

                    if one_shot {
                        debug!(root = %root.display(), "Initial pass finished");
                    } else {
                        info!(root = %root.display(), "Sync complete");
                        steady += 1;
                        if steady == 1 {
                            self.enter(Phase::SteadyState);
                            self.announce_steady_state();
                        }
                    }
                }
                RootSignal::Ended { root, result } => {
                    total.merge(result);
                    settled.insert(root);
                    ended += 1;
                }
                RootSignal::Failed { root, message } => {
                    anyhow::bail!("Watcher for {} failed: {message}", root.display());
                }
            }

            if one_shot && settled.len() >= expected {
                info!(group = %self.group.name, "{}", SyncReporter::generate_summary(&total));
                return Ok(SessionOutcome::Completed(total));
            }
            if ended >= expected {
                break;
            }
        }

        warn!(group = %self.group.name, "All watchers stopped");
        Ok(SessionOutcome::Stopped(total))
    }

    /// Log "Waiting for changes..." once after a delay and fire the hook
    fn announce_steady_state(&self) {
        let delay = self.options.waiting_delay;
        let hook = self.on_steady.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Waiting for changes...");
            if let Some(hook) = hook {
                hook();
            }
        });
    }
}

/// Consumer side of one root's watch stream
struct Pump {
    policy: WatcherFailurePolicy,
    one_shot: bool,
    signals: mpsc::UnboundedSender<RootSignal>,
}

impl Pump {
    async fn run(self, mut stream: WatchStream, dispatcher: Arc<Dispatcher>) {
        let root = stream.root().to_path_buf();
        let mut tally = SyncResult::default();

        while let Some(event) = stream.next().await {
            match event {
                WatchEvent::Change(change) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    match tokio::task::spawn_blocking(move || dispatcher.apply(&change)).await {
                        Ok(outcomes) => {
                            for outcome in &outcomes {
                                tally.record(outcome);
                            }
                        }
                        Err(e) => {
                            error!(root = %root.display(), error = %e, "Dispatch task failed");
                            tally.errors.push(e.to_string());
                        }
                    }
                }
                WatchEvent::Ready => {
                    let result = std::mem::take(&mut tally);
                    let _ = self.signals.send(RootSignal::Ready {
                        root: root.clone(),
                        result,
                    });
                }
                WatchEvent::Error(err) => {
                    error!(root = %root.display(), error = %err, "Watcher error");
                    if !err.is_fatal() {
                        continue;
                    }
                    if self.policy == WatcherFailurePolicy::Exit {
                        let _ = self.signals.send(RootSignal::Failed {
                            root: root.clone(),
                            message: err.to_string(),
                        });
                        return;
                    }
                    // Nothing to wait for in a one-shot pass
                    if self.one_shot {
                        break;
                    }
                }
            }
        }

        let _ = self.signals.send(RootSignal::Ended { root, result: tally });
    }
}
