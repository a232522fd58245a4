//! Reading and normalizing ignore-pattern files

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::Result;

/// Ecosystem ignore file, read first
pub const PRIMARY_IGNORE_FILE: &str = ".gitignore";

/// Tool-specific ignore file, read second
pub const TOOL_IGNORE_FILE: &str = ".reposyncignore";

/// Entries in the primary file that never exclude anything
const PROTECTED_ENTRIES: [&str; 2] = ["dist", "/dist"];

/// Which ignore file a pattern list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// `.gitignore`
    Primary,
    /// `.reposyncignore`
    ToolSpecific,
}

impl PatternSource {
    /// File name inside the source root
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Primary => PRIMARY_IGNORE_FILE,
            Self::ToolSpecific => TOOL_IGNORE_FILE,
        }
    }
}

/// Patterns read from one ignore file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFile {
    /// Where the patterns were read from
    pub path: PathBuf,
    /// Normalized patterns in file order
    pub patterns: Vec<String>,
}

/// Read one ignore file from `root`
///
/// A missing file is `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_pattern_file(root: &Path, source: PatternSource) -> Result<Option<PatternFile>> {
    let path = root.join(source.file_name());
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read ignore file: {}", path.display()));
        }
    };

    Ok(Some(PatternFile {
        patterns: normalize_patterns(&content, source),
        path,
    }))
}

/// Normalize the lines of an ignore file
///
/// Lines are trimmed; blank lines and `#` comments are dropped and one
/// trailing `/` is stripped. The primary file additionally loses any
/// entry naming `dist`, so build output is always mirrored.
#[must_use]
pub fn normalize_patterns(content: &str, source: PatternSource) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_suffix('/').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .filter(|line| source != PatternSource::Primary || !PROTECTED_ENTRIES.contains(line))
        .map(str::to_string)
        .collect()
}
