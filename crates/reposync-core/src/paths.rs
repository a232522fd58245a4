//! Lexical path resolution for configured source and destination roots
//!
//! Resolution never touches the filesystem: configured entries are joined
//! onto a base directory and `.`/`..` components are folded away. A root
//! that does not exist yet resolves just like one that does.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::error::Result;

/// Resolves configured path strings into absolute paths
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// Create a resolver that anchors relative entries at `base`
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: normalize(&base.into()),
        }
    }

    /// Create a resolver anchored at the process working directory
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be determined.
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        Ok(Self::new(dunce::simplified(&cwd)))
    }

    /// Base directory relative entries are joined onto
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a single entry
    #[must_use]
    pub fn resolve_one(&self, entry: &Path) -> PathBuf {
        if entry.is_absolute() {
            normalize(entry)
        } else {
            normalize(&self.base.join(entry))
        }
    }

    /// Resolve a list of entries, preserving input order
    ///
    /// Blank entries are dropped. An empty result is reported at error
    /// level but is not a failure: the caller proceeds with nothing to do.
    pub fn resolve<I, P>(&self, role: &str, entries: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut resolved = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.as_os_str().is_empty() || entry.to_string_lossy().trim().is_empty() {
                warn!(role, "Skipping blank {role} entry");
                continue;
            }
            resolved.push(self.resolve_one(entry));
        }

        if resolved.is_empty() {
            error!(role, "No {role} directories found");
        } else {
            let listing: Vec<String> = resolved.iter().map(|p| p.display().to_string()).collect();
            info!(role, "Found {role} directories: {}", listing.join(", "));
        }

        resolved
    }
}

/// Fold `.` and `..` components without consulting the filesystem
///
/// `..` never climbs above the root of an absolute path. Leading `..`
/// components of a relative path are kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
