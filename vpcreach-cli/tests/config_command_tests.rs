//! Integration tests for `vpcreach config` command.
//!
//! Tests config validation with real TOML files.

use std::fs;
use tempfile::TempDir;

use vpcreach_core::config::ReachConfig;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpcreach.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[trace]
max_in_flight = 8
max_hops = 32
timeout_secs = 10

[provider]
snapshot_path = "snapshot.json"
domain = "aws"
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let result = ReachConfig::load(&config_path).await;

    // Then: Should succeed with the file's values
    let config = result.expect("valid config should load successfully");
    assert_eq!(config.trace.max_hops, 32);
    assert_eq!(config.provider.snapshot_path, "snapshot.json");
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    // Given: A malformed TOML file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    // When: Loading the config
    let result = ReachConfig::load(&config_path).await;

    // Then: Should fail
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    // Given: A nonexistent file path
    let config_path = std::path::PathBuf::from("/nonexistent/vpcreach.toml");

    // When: Loading the config
    let result = ReachConfig::load(&config_path).await;

    // Then: Should fail
    assert!(result.is_err(), "missing file should fail to load");
}

#[tokio::test]
async fn test_config_validate_empty_file_uses_defaults() {
    // Given: An empty config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    // When: Loading the config
    let result = ReachConfig::load(&config_path).await;

    // Then: Every section falls back to its defaults
    let config = result.expect("empty config should load with defaults");
    assert_eq!(config.provider.domain, "aws");
    assert!(config.trace.max_hops > 0);
}

#[tokio::test]
async fn test_config_validate_invalid_log_format() {
    // Given: A config with an unknown log format
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpcreach.toml");
    fs::write(&config_path, "[general]\nlog_format = \"xml\"\n").expect("should write config");

    // When: Loading the config
    let result = ReachConfig::load(&config_path).await;

    // Then: Validation names the offending field
    let err = result.expect_err("xml log format should be rejected");
    assert!(err.to_string().contains("general.log_format"));
}

#[test]
fn test_config_show_serializes_sections() {
    // Given: The default configuration
    let config = ReachConfig::default();

    // When: Serializing it the way `config show` does
    let full = toml::to_string_pretty(&config).expect("should serialize");

    // Then: All sections are present and round-trip through the parser
    assert!(full.contains("[general]"));
    assert!(full.contains("[trace]"));
    assert!(full.contains("[provider]"));
    let reparsed = ReachConfig::parse(&full).expect("shown config should parse");
    assert_eq!(reparsed.provider.domain, config.provider.domain);
}
