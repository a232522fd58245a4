//! Source-to-destination path mapping

use std::path::{Path, PathBuf};

use crate::config::is_single_component;

/// Maps paths under one source root into each destination root
///
/// The target of `relative` in `destination` is always
/// `destination/<marker>/relative`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationMapping {
    source_root: PathBuf,
    marker: String,
}

impl DestinationMapping {
    /// Mapping for `source_root`, using its basename unless `marker` is set
    ///
    /// Returns `None` when no usable marker exists (the source is a
    /// filesystem root and no override was configured).
    #[must_use]
    pub fn new(source_root: &Path, marker: Option<&str>) -> Option<Self> {
        let marker = match marker {
            Some(marker) => marker.to_string(),
            None => source_root.file_name()?.to_string_lossy().into_owned(),
        };

        if !is_single_component(&marker) {
            return None;
        }

        Some(Self {
            source_root: source_root.to_path_buf(),
            marker,
        })
    }

    /// Source root this mapping strips from event paths
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Marker segment
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Root of the mirrored subtree inside `destination`
    #[must_use]
    pub fn mirror_root(&self, destination: &Path) -> PathBuf {
        destination.join(&self.marker)
    }

    /// Path of `source_path` relative to the source root
    ///
    /// `None` for paths outside the root.
    #[must_use]
    pub fn relative<'a>(&self, source_path: &'a Path) -> Option<&'a Path> {
        source_path.strip_prefix(&self.source_root).ok()
    }

    /// Destination path for an absolute path under the source root
    #[must_use]
    pub fn target(&self, destination: &Path, source_path: &Path) -> Option<PathBuf> {
        let relative = self.relative(source_path)?;
        Some(self.target_for_relative(destination, relative))
    }

    /// Destination path for a path already relative to the source root
    #[must_use]
    pub fn target_for_relative(&self, destination: &Path, relative: &Path) -> PathBuf {
        let root = self.mirror_root(destination);
        if relative.as_os_str().is_empty() {
            root
        } else {
            root.join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_defaults_to_source_basename() {
        let mapping = DestinationMapping::new(Path::new("/work/packages/ui"), None).unwrap();
        assert_eq!(mapping.marker(), "ui");
        assert_eq!(
            mapping.mirror_root(Path::new("/app/node_modules")),
            PathBuf::from("/app/node_modules/ui")
        );
    }

    #[test]
    fn test_marker_override() {
        let mapping =
            DestinationMapping::new(Path::new("/work/packages/ui"), Some("@scope-ui")).unwrap();
        assert_eq!(
            mapping.target(Path::new("/dest"), Path::new("/work/packages/ui/src/a.js")),
            Some(PathBuf::from("/dest/@scope-ui/src/a.js"))
        );
    }

    #[test]
    fn test_target_is_deterministic() {
        let mapping = DestinationMapping::new(Path::new("/src/lib"), None).unwrap();
        let a = mapping.target(Path::new("/d"), Path::new("/src/lib/x/y.txt"));
        let b = mapping.target(Path::new("/d"), Path::new("/src/lib/x/y.txt"));
        assert_eq!(a, b);
        assert_eq!(a, Some(PathBuf::from("/d/lib/x/y.txt")));
    }

    #[test]
    fn test_source_root_maps_to_mirror_root() {
        let mapping = DestinationMapping::new(Path::new("/src/lib"), None).unwrap();
        assert_eq!(
            mapping.target(Path::new("/d"), Path::new("/src/lib")),
            Some(PathBuf::from("/d/lib"))
        );
    }

    #[test]
    fn test_path_outside_source_has_no_target() {
        let mapping = DestinationMapping::new(Path::new("/src/lib"), None).unwrap();
        assert_eq!(mapping.target(Path::new("/d"), Path::new("/src/library/a")), None);
    }

    #[test]
    fn test_filesystem_root_has_no_marker() {
        assert!(DestinationMapping::new(Path::new("/"), None).is_none());
        assert!(DestinationMapping::new(Path::new("/"), Some("root")).is_some());
        assert!(DestinationMapping::new(Path::new("/x"), Some("../escape")).is_none());
    }
}
