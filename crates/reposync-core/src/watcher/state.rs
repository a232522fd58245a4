//! Snapshot diffing with write-stability and atomic-rename handling
//!
//! `PollState` is driven by the polling task but performs no I/O and
//! takes the current instant as an argument, so every timing rule can be
//! exercised with synthetic snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::snapshot::{EntryKind, Fingerprint, Snapshot};
use super::{ChangeEvent, ChangeKind, WatchError, WatchEvent, WatchOptions};

/// A file waiting for its size and mtime to settle
#[derive(Debug, Clone, Copy)]
struct Pending {
    fingerprint: Fingerprint,
    since: Instant,
    kind: ChangeKind,
}

/// Diff state for one source root
#[derive(Debug)]
pub struct PollState {
    root: PathBuf,
    stability_threshold: Duration,
    atomic_window: Duration,
    binary_interval: Duration,
    /// Entries the consumer has been told about
    known: BTreeMap<PathBuf, Fingerprint>,
    /// Files seen but not yet stable
    pending: BTreeMap<PathBuf, Pending>,
    /// Known files that disappeared while their parent stayed
    vanished: BTreeMap<PathBuf, Instant>,
    /// Initial-scan files still unsettled; `None` once ready was sent
    initial: Option<BTreeSet<PathBuf>>,
    scanned: bool,
    last_binary_check: Option<Instant>,
    reported_unreadable: BTreeSet<PathBuf>,
}

impl PollState {
    /// Fresh state for `root`
    #[must_use]
    pub fn new(root: &Path, options: &WatchOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            stability_threshold: options.stability_threshold,
            atomic_window: options.atomic_window,
            binary_interval: options.binary_interval,
            known: BTreeMap::new(),
            pending: BTreeMap::new(),
            vanished: BTreeMap::new(),
            initial: None,
            scanned: false,
            last_binary_check: None,
            reported_unreadable: BTreeSet::new(),
        }
    }

    /// Whether any file is waiting for stability or its atomic window
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.vanished.is_empty()
    }

    /// Files currently waiting for stability
    #[must_use]
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.pending.keys().cloned().collect()
    }

    /// Fold a full scan into the state
    pub fn observe(&mut self, snapshot: &Snapshot, now: Instant) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        self.report_unreadable(snapshot, &mut events);

        let binary_due = self
            .last_binary_check
            .is_none_or(|last| now.duration_since(last) >= self.binary_interval);
        if binary_due {
            self.last_binary_check = Some(now);
        }

        self.detect_removals(snapshot, now, &mut events);
        self.expire_vanished(snapshot, now, &mut events);
        self.detect_additions(snapshot, now, binary_due, &mut events);

        // Unstable files that disappeared were never announced
        self.pending.retain(|path, _| {
            snapshot
                .entries
                .get(path)
                .is_some_and(|fp| fp.kind == EntryKind::File)
        });

        if !self.scanned {
            self.scanned = true;
            self.initial = Some(self.pending.keys().cloned().collect());
        }

        self.settle(now, &mut events);
        events
    }

    /// Fold fresh stats for pending files into the state
    ///
    /// Used between full scans, at the stability poll cadence.
    pub fn refresh(&mut self, stats: &[(PathBuf, Option<Fingerprint>)], now: Instant) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        for (path, fingerprint) in stats {
            match fingerprint {
                Some(current) => {
                    let Some(pending) = self.pending.get_mut(path) else {
                        continue;
                    };
                    if pending.fingerprint.differs(current) {
                        pending.fingerprint = *current;
                        pending.since = now;
                    }
                }
                None => {
                    self.pending.remove(path);
                }
            }
        }

        self.settle(now, &mut events);
        events
    }

    fn report_unreadable(&mut self, snapshot: &Snapshot, events: &mut Vec<WatchEvent>) {
        let current: BTreeSet<PathBuf> = snapshot.unreadable.iter().map(|(p, _)| p.clone()).collect();
        for (path, message) in &snapshot.unreadable {
            if !self.reported_unreadable.contains(path) {
                events.push(WatchEvent::Error(WatchError::Traversal {
                    path: path.clone(),
                    message: message.clone(),
                }));
            }
        }
        self.reported_unreadable = current;
    }

    /// Known entries missing from the scan, deepest first
    fn detect_removals(&mut self, snapshot: &Snapshot, now: Instant, events: &mut Vec<WatchEvent>) {
        let missing: Vec<(PathBuf, Fingerprint, bool)> = self
            .known
            .iter()
            .filter(|(path, _)| !snapshot.is_shadowed(path))
            .filter_map(|(path, known)| match snapshot.entries.get(path) {
                None => Some((path.clone(), *known, false)),
                Some(current) if current.kind != known.kind => Some((path.clone(), *known, true)),
                Some(_) => None,
            })
            .collect();

        for (path, fingerprint, replaced) in missing.into_iter().rev() {
            match fingerprint.kind {
                EntryKind::Dir => {
                    self.known.remove(&path);
                    self.emit(events, ChangeKind::DirRemoved, path);
                }
                EntryKind::File => {
                    let parent_present = path
                        .parent()
                        .and_then(|parent| snapshot.entries.get(parent))
                        .is_some_and(|parent| parent.kind == EntryKind::Dir);
                    if parent_present && !replaced {
                        self.vanished.entry(path).or_insert(now);
                    } else {
                        self.vanished.remove(&path);
                        self.known.remove(&path);
                        self.emit(events, ChangeKind::FileRemoved, path);
                    }
                }
            }
        }
    }

    /// Files that came back within the atomic window become one change;
    /// the rest are reported removed once the window has passed
    fn expire_vanished(&mut self, snapshot: &Snapshot, now: Instant, events: &mut Vec<WatchEvent>) {
        let vanished = std::mem::take(&mut self.vanished);

        for (path, since) in vanished {
            match snapshot.entries.get(&path) {
                Some(current) if current.kind == EntryKind::File => {
                    let changed = self.known.get(&path).is_none_or(|known| known.differs(current));
                    if changed {
                        self.pending.entry(path).or_insert(Pending {
                            fingerprint: *current,
                            since: now,
                            kind: ChangeKind::FileChanged,
                        });
                    }
                }
                _ if now.duration_since(since) >= self.atomic_window => {
                    self.known.remove(&path);
                    self.pending.remove(&path);
                    self.emit(events, ChangeKind::FileRemoved, path);
                }
                _ => {
                    self.vanished.insert(path, since);
                }
            }
        }
    }

    fn detect_additions(
        &mut self,
        snapshot: &Snapshot,
        now: Instant,
        binary_due: bool,
        events: &mut Vec<WatchEvent>,
    ) {
        for (path, current) in &snapshot.entries {
            match current.kind {
                EntryKind::Dir => {
                    if !self.known.contains_key(path) {
                        self.known.insert(path.clone(), *current);
                        self.emit(events, ChangeKind::DirAdded, path.clone());
                    }
                }
                EntryKind::File => {
                    if self.vanished.contains_key(path) {
                        continue;
                    }
                    if let Some(pending) = self.pending.get_mut(path) {
                        if pending.fingerprint.differs(current) {
                            pending.fingerprint = *current;
                            pending.since = now;
                        }
                        continue;
                    }
                    match self.known.get(path) {
                        None => {
                            self.pending.insert(
                                path.clone(),
                                Pending {
                                    fingerprint: *current,
                                    since: now,
                                    kind: ChangeKind::FileAdded,
                                },
                            );
                        }
                        Some(known) if known.differs(current) && (binary_due || !current.binary) => {
                            self.pending.insert(
                                path.clone(),
                                Pending {
                                    fingerprint: *current,
                                    since: now,
                                    kind: ChangeKind::FileChanged,
                                },
                            );
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    /// Announce files that have been stable long enough
    fn settle(&mut self, now: Instant, events: &mut Vec<WatchEvent>) {
        let stable: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.duration_since(pending.since) >= self.stability_threshold)
            .map(|(path, _)| path.clone())
            .collect();

        for path in stable {
            if let Some(pending) = self.pending.remove(&path) {
                self.known.insert(path.clone(), pending.fingerprint);
                self.emit(events, pending.kind, path);
            }
        }

        if let Some(initial) = &mut self.initial {
            initial.retain(|path| self.pending.contains_key(path));
            if initial.is_empty() {
                self.initial = None;
                events.push(WatchEvent::Ready);
            }
        }
    }

    fn emit(&self, events: &mut Vec<WatchEvent>, kind: ChangeKind, path: PathBuf) {
        events.push(WatchEvent::Change(ChangeEvent {
            kind,
            path,
            source_root: self.root.clone(),
        }));
    }
}
