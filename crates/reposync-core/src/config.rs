//! Configuration file parsing and management
//!
//! This module handles:
//! - Config file discovery (CLI path, project file, global XDG file)
//! - TOML and JSON parsing with serde
//! - Validation and error reporting
//! - Turning instances into immutable sync groups

mod discovery;
mod types;
mod validation;

#[cfg(test)]
mod integration_tests;

use std::fs;
use std::path::Path;

use anyhow::Context;

pub use discovery::{ConfigDiscovery, ConfigFiles, PROJECT_CONFIG_NAMES};
pub use types::{
    Config, InstanceConfig, SourceRoot, SyncGroup, WatchSettings, WatcherFailurePolicy,
};
pub use validation::{ConfigError, ConfigValidator};

pub(crate) use validation::is_single_component;

use crate::error::Result;

/// Configuration manager that coordinates discovery, parsing and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Locate, parse and validate the configuration
    ///
    /// `start` is where the upward search for a project file begins.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config path does not exist, if no
    /// config file can be found, or if the file is invalid.
    pub fn load(cli_config_path: Option<&Path>, start: &Path) -> Result<Config> {
        if let Some(path) = cli_config_path
            && !path.is_file()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let files = ConfigDiscovery::discover(cli_config_path, start);
        let Some(path) = files.preferred() else {
            anyhow::bail!(
                "No configuration found (looked for {} from {})",
                PROJECT_CONFIG_NAMES.join(" or "),
                start.display()
            );
        };

        let config = Self::read(path)?;
        ConfigValidator::validate(&config)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        tracing::debug!(path = %path.display(), instances = config.instances.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse a single config file, choosing the format by extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }
}
