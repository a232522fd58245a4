//! Gitignore-style ignore rules using the ignore crate
//!
//! Each source root gets one [`IgnoreSpec`], compiled once at session
//! start. Built-in patterns always apply; the root's `.gitignore` and
//! `.reposyncignore` are added on top unless the root is exempt.

mod sources;

use std::path::{Path, PathBuf};

use anyhow::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

pub use sources::{
    PRIMARY_IGNORE_FILE, PatternFile, PatternSource, TOOL_IGNORE_FILE, normalize_patterns,
    read_pattern_file,
};

use crate::error::Result;

/// Patterns excluded from every source root, in order
///
/// Dotfiles at any depth, the tool's own control files and the
/// dependency cache at the root.
pub const BUILTIN_PATTERNS: [&str; 4] = [".*", "/reposync.toml", "/reposync.json", "/node_modules"];

/// Compiled ignore rules for one source root
#[derive(Debug, Clone)]
pub struct IgnoreSpec {
    root: PathBuf,
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreSpec {
    /// Compile the rules for `root`
    ///
    /// Missing ignore files contribute nothing. When `ignore_exempt` is
    /// set the files are not read at all.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore file exists but cannot be read, or a
    /// pattern is not a valid glob.
    pub fn compile(root: &Path, ignore_exempt: bool) -> Result<Self> {
        let mut files = Vec::new();
        if !ignore_exempt {
            for source in [PatternSource::Primary, PatternSource::ToolSpecific] {
                if let Some(file) = read_pattern_file(root, source)? {
                    files.push(file);
                }
            }
        }

        Self::from_pattern_files(root, &files)
    }

    /// Build a spec from the built-ins plus already-read pattern files
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn from_pattern_files(root: &Path, files: &[PatternFile]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let mut patterns = Vec::new();

        for pattern in BUILTIN_PATTERNS {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("Invalid built-in pattern: '{pattern}'"))?;
            patterns.push(pattern.to_string());
        }

        for file in files {
            for pattern in &file.patterns {
                builder
                    .add_line(Some(file.path.clone()), pattern)
                    .with_context(|| {
                        format!("Invalid ignore pattern '{pattern}' in {}", file.path.display())
                    })?;
                patterns.push(pattern.clone());
            }
        }

        let matcher = builder
            .build()
            .with_context(|| format!("Failed to compile ignore rules for {}", root.display()))?;

        debug!(
            root = %root.display(),
            patterns = patterns.len(),
            "Compiled ignore rules"
        );

        Ok(Self {
            root: root.to_path_buf(),
            patterns,
            matcher,
        })
    }

    /// Source root the patterns are relative to
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalized patterns in the order they were added
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check whether an absolute path is excluded
    ///
    /// The path matches when it, or any of its ancestors below the root,
    /// matches a pattern. Paths outside the root and the root itself
    /// never match.
    #[must_use]
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}
