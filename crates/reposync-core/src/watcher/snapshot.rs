//! Point-in-time listing of a source tree

use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use super::WatchError;
use crate::ignore_rules::IgnoreSpec;

/// Extensions polled at the slower binary cadence
const BINARY_EXTENSIONS: &[&str] = &[
    "7z", "a", "avi", "bin", "bmp", "class", "dll", "dylib", "eot", "exe", "gif", "gz", "ico",
    "jar", "jpeg", "jpg", "mov", "mp3", "mp4", "node", "o", "otf", "pdf", "png", "so", "tar",
    "tgz", "ttf", "wasm", "wav", "webm", "webp", "woff", "woff2", "xz", "zip",
];

/// Entry type tracked by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
}

/// What the watcher remembers about an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    /// File or directory
    pub kind: EntryKind,
    /// Length in bytes
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
    /// Polled at the binary cadence
    pub binary: bool,
}

impl Fingerprint {
    /// Fingerprint of a directory (size and mtime are not tracked)
    #[must_use]
    pub const fn dir() -> Self {
        Self {
            kind: EntryKind::Dir,
            size: 0,
            modified: None,
            binary: false,
        }
    }

    /// Fingerprint of a file
    #[must_use]
    pub fn file(path: &Path, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            modified,
            binary: is_binary(path),
        }
    }

    fn from_metadata(path: &Path, metadata: &Metadata) -> Option<Self> {
        if metadata.is_dir() {
            Some(Self::dir())
        } else if metadata.is_file() {
            Some(Self::file(path, metadata.len(), metadata.modified().ok()))
        } else {
            None
        }
    }

    /// Whether the entry looks different from `other`
    #[must_use]
    pub fn differs(&self, other: &Self) -> bool {
        self.kind != other.kind || self.size != other.size || self.modified != other.modified
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
}

/// Listing of every non-ignored entry under a root
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Entries keyed by absolute path; parents sort before children
    pub entries: BTreeMap<PathBuf, Fingerprint>,
    /// Subtrees that could not be read, with the reason
    pub unreadable: Vec<(PathBuf, String)>,
}

impl Snapshot {
    /// Whether `path` lies in (or is) a subtree that failed to be read
    #[must_use]
    pub fn is_shadowed(&self, path: &Path) -> bool {
        self.unreadable.iter().any(|(dir, _)| path.starts_with(dir))
    }
}

/// Walk the tree below `spec.root()`
///
/// Ignored subtrees are pruned before descent and symbolic links are
/// skipped without being followed.
///
/// # Errors
///
/// Returns [`WatchError::RootUnavailable`] when the root itself cannot
/// be listed.
pub fn scan(spec: &IgnoreSpec, max_depth: usize) -> Result<Snapshot, WatchError> {
    let root = spec.root();
    let root_meta = fs::metadata(root).map_err(|source| WatchError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_meta.is_dir() {
        return Err(WatchError::RootUnavailable {
            path: root.to_path_buf(),
            source: std::io::Error::new(ErrorKind::NotADirectory, "not a directory"),
        });
    }

    let mut snapshot = Snapshot::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !spec.matches(entry.path(), entry.file_type().is_dir())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                let vanished = err
                    .io_error()
                    .is_some_and(|io| io.kind() == ErrorKind::NotFound);
                if vanished {
                    continue;
                }
                if err.depth() == 0 {
                    return Err(WatchError::RootUnavailable {
                        path,
                        source: err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk failed")),
                    });
                }
                snapshot.unreadable.push((path, err.to_string()));
                continue;
            }
        };

        if entry.path_is_symlink() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                if let Some(fingerprint) = Fingerprint::from_metadata(entry.path(), &metadata) {
                    snapshot
                        .entries
                        .insert(entry.path().to_path_buf(), fingerprint);
                }
            }
            Err(err) => {
                let vanished = err
                    .io_error()
                    .is_some_and(|io| io.kind() == ErrorKind::NotFound);
                if !vanished {
                    snapshot
                        .unreadable
                        .push((entry.path().to_path_buf(), err.to_string()));
                }
            }
        }
    }

    Ok(snapshot)
}

/// Current fingerprint of a single file, `None` if it is gone or no
/// longer a regular file
#[must_use]
pub fn stat(path: &Path) -> Option<Fingerprint> {
    let metadata = fs::symlink_metadata(path).ok()?;
    if metadata.file_type().is_symlink() {
        return None;
    }
    Fingerprint::from_metadata(path, &metadata).filter(|fp| fp.kind == EntryKind::File)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pkg");
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("index.js"), "module.exports = 1;").unwrap();
        fs::write(root.join("src/nested/deep.js"), "deep").unwrap();
        fs::write(root.join("node_modules/dep/index.js"), "dep").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        (tmp, root)
    }

    #[test]
    fn test_scan_lists_non_ignored_entries() {
        let (_tmp, root) = tree();
        let spec = IgnoreSpec::compile(&root, false).unwrap();

        let snapshot = scan(&spec, 99).unwrap();
        let paths: Vec<&PathBuf> = snapshot.entries.keys().collect();

        assert_eq!(
            paths,
            vec![
                &root,
                &root.join("index.js"),
                &root.join("src"),
                &root.join("src/nested"),
                &root.join("src/nested/deep.js"),
            ]
        );
        assert!(snapshot.unreadable.is_empty());
    }

    #[test]
    fn test_scan_respects_max_depth() {
        let (_tmp, root) = tree();
        let spec = IgnoreSpec::compile(&root, false).unwrap();

        let snapshot = scan(&spec, 1).unwrap();
        assert!(snapshot.entries.contains_key(&root.join("src")));
        assert!(!snapshot.entries.contains_key(&root.join("src/nested")));
    }

    #[test]
    fn test_scan_missing_root() {
        let tmp = TempDir::new().unwrap();
        let spec = IgnoreSpec::compile(&tmp.path().join("gone"), false).unwrap();

        let err = scan(&spec, 99).unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_symlinks() {
        let (tmp, root) = tree();
        std::os::unix::fs::symlink(tmp.path(), root.join("loop")).unwrap();
        std::os::unix::fs::symlink(root.join("index.js"), root.join("alias.js")).unwrap();
        let spec = IgnoreSpec::compile(&root, false).unwrap();

        let snapshot = scan(&spec, 99).unwrap();
        assert!(!snapshot.entries.contains_key(&root.join("loop")));
        assert!(!snapshot.entries.contains_key(&root.join("alias.js")));
        assert!(stat(&root.join("alias.js")).is_none());
    }

    #[test]
    fn test_binary_detection() {
        let fp = Fingerprint::file(Path::new("logo.PNG"), 10, None);
        assert!(fp.binary);
        assert!(!Fingerprint::file(Path::new("index.js"), 10, None).binary);
    }

    #[test]
    fn test_stat_file_and_dir() {
        let (_tmp, root) = tree();
        let fp = stat(&root.join("index.js")).unwrap();
        assert_eq!(fp.kind, EntryKind::File);
        assert_eq!(fp.size, "module.exports = 1;".len() as u64);
        assert!(stat(&root.join("src")).is_none());
        assert!(stat(&root.join("missing.js")).is_none());
    }
}
