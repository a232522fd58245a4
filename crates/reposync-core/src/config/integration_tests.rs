//! Integration tests for configuration module

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use super::{ConfigManager, WatcherFailurePolicy};
use crate::paths::PathResolver;

#[test]
fn test_full_config_workflow() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("reposync.toml");

    fs::write(
        &config_file,
        r#"
continuous = true

[[instances]]
sources = ["lib", "assets"]
destinations = ["../app-a/node_modules", "../app-b/node_modules"]
ignore_exempt = ["assets"]

[[instances]]
sources = ["types"]
destinations = ["/srv/types"]
marker = "shared-types"

[watch]
poll_interval_ms = 50
stability_threshold_ms = 250
on_error = "stop"
"#,
    )
    .unwrap();

    let config = ConfigManager::load(None, tmp.path()).unwrap();

    assert!(config.continuous);
    assert_eq!(config.instances.len(), 2);
    assert_eq!(config.watch.poll_interval_ms, 50);
    assert_eq!(config.watch.on_error, WatcherFailurePolicy::Stop);

    let groups = config.groups(&PathResolver::new(tmp.path()));
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "instance 1");
    assert_eq!(groups[0].destinations.len(), 2);
    assert!(!groups[0].sources[0].ignore_exempt);
    assert!(groups[0].sources[1].ignore_exempt);
    assert_eq!(groups[1].marker.as_deref(), Some("shared-types"));
}

#[test]
fn test_legacy_json_config() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("config.json");

    fs::write(
        &config_file,
        r#"{
  "instances": [
    {
      "fromDirectories": ["./packages/ui"],
      "toDirectories": ["../consumer/node_modules/@scope"]
    }
  ]
}"#,
    )
    .unwrap();

    let config = ConfigManager::load(Some(&config_file), tmp.path()).unwrap();

    assert!(!config.continuous);
    assert_eq!(
        config.instances[0].sources,
        vec![PathBuf::from("./packages/ui")]
    );
}

#[test]
fn test_invalid_config_validation() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("reposync.toml");

    fs::write(
        &config_file,
        r#"
[[instances]]
sources = ["lib"]
destinations = ["out"]

[watch]
max_depth = 0
"#,
    )
    .unwrap();

    let result = ConfigManager::load(Some(&config_file), tmp.path());
    assert!(result.is_err());

    let err_msg = format!("{:#}", result.unwrap_err());
    assert!(err_msg.contains("Invalid configuration"));
    assert!(err_msg.contains("max_depth"));
}

#[test]
fn test_malformed_toml() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("broken.toml");
    fs::write(&config_file, "[[instances]\nsources = ").unwrap();

    let err = ConfigManager::load(Some(&config_file), tmp.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML config"));
}

#[test]
fn test_missing_explicit_config() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let err = ConfigManager::load(Some(&missing), tmp.path()).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}
