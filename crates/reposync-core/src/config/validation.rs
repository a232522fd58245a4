//! Configuration validation and error reporting

use std::path::{Component, Path};

use super::types::Config;

/// Reasons a configuration is rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Nothing to run
    #[error("No instances configured")]
    NoInstances,

    /// A polling interval of zero would spin
    #[error("watch.{field} must be greater than zero")]
    ZeroInterval {
        /// Offending setting
        field: &'static str,
    },

    /// Depth zero would watch nothing below the root
    #[error("watch.max_depth must be greater than zero")]
    ZeroDepth,

    /// Marker is not a plain directory name
    #[error("Instance #{instance} has an invalid marker '{marker}': expected a single directory name")]
    InvalidMarker {
        /// One-based instance index
        instance: usize,
        /// Marker as configured
        marker: String,
    },
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a configuration
    ///
    /// Empty source or destination lists are accepted: a session with
    /// nothing to mirror logs the fact and carries on.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }

        let watch = &config.watch;
        let intervals = [
            ("poll_interval_ms", watch.poll_interval_ms),
            ("binary_interval_ms", watch.binary_interval_ms),
            ("stability_poll_ms", watch.stability_poll_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }

        if watch.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }

        for (idx, instance) in config.instances.iter().enumerate() {
            if let Some(marker) = &instance.marker
                && !is_single_component(marker)
            {
                return Err(ConfigError::InvalidMarker {
                    instance: idx + 1,
                    marker: marker.clone(),
                });
            }
        }

        Ok(())
    }
}

/// True when `name` is exactly one normal path component
pub(crate) fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
