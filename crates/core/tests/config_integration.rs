//! vpcreach.toml 통합 설정 테스트
//!
//! - vpcreach.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use vpcreach_core::config::ReachConfig;
use vpcreach_core::error::{ConfigError, ReachError};

// =============================================================================
// vpcreach.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../vpcreach.toml.example");
    let config = ReachConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.trace.max_in_flight, 64);
    assert_eq!(config.trace.channel_capacity, 256);
    assert_eq!(config.trace.max_hops, 32);
    assert_eq!(config.trace.timeout_secs, 30);
    assert!(!config.trace.fail_fast);
    assert_eq!(config.provider.snapshot_path, "vpcreach-snapshot.json");
    assert_eq!(config.provider.domain, "aws");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../vpcreach.toml.example");
    let config = ReachConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_trace_only() {
    let toml = r#"
[trace]
max_in_flight = 4
fail_fast = true
"#;
    let config = ReachConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.trace.max_in_flight, 4);
    assert!(config.trace.fail_fast);
    // 생략된 필드는 기본값
    assert_eq!(config.trace.max_hops, 32);
    assert_eq!(config.provider.domain, "aws");
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[general]
log_level = "warn"
log_format = "json"

[provider]
snapshot_path = "/srv/snapshots/prod.json"
"#;
    let config = ReachConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.provider.snapshot_path, "/srv/snapshots/prod.json");
    assert_eq!(config.trace.channel_capacity, 256);
}

#[test]
fn unknown_log_format_fails_validation() {
    let toml = r#"
[general]
log_format = "xml"
"#;
    let config = ReachConfig::parse(toml).expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        ReachError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "general.log_format"
    ));
}

#[test]
fn wrong_type_is_parse_error() {
    let toml = r#"
[trace]
max_hops = "many"
"#;
    let err = ReachConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        ReachError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: serial_test 로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;
    let level = with_env("VPCREACH_GENERAL_LOG_LEVEL", "error", || {
        let mut config = ReachConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.general.log_level
    });
    assert_eq!(level, "error");
}

#[test]
#[serial_test::serial]
fn env_override_trace_numbers() {
    let hops = with_env("VPCREACH_TRACE_MAX_HOPS", "12", || {
        let mut config = ReachConfig::default();
        config.apply_env_overrides();
        config.trace.max_hops
    });
    assert_eq!(hops, 12);
}

#[test]
#[serial_test::serial]
fn env_override_fail_fast() {
    let fail_fast = with_env("VPCREACH_TRACE_FAIL_FAST", "true", || {
        let mut config = ReachConfig::default();
        config.apply_env_overrides();
        config.trace.fail_fast
    });
    assert!(fail_fast);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_is_ignored() {
    let in_flight = with_env("VPCREACH_TRACE_MAX_IN_FLIGHT", "lots", || {
        let mut config = ReachConfig::default();
        config.apply_env_overrides();
        config.trace.max_in_flight
    });
    assert_eq!(in_flight, 64);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = ReachConfig::from_file("/tmp/vpcreach_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        ReachError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_reads_temp_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vpcreach.toml");
    tokio::fs::write(&path, "[trace]\ntimeout_secs = 5\n")
        .await
        .expect("write");

    let config = ReachConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.trace.timeout_secs, 5);
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vpcreach.toml");
    tokio::fs::write(&path, "[trace]\nchannel_capacity = 0\n")
        .await
        .expect("write");

    let err = ReachConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("channel_capacity"));
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn example_config_serialize_roundtrip() {
    let content = include_str!("../../../vpcreach.toml.example");
    let config = ReachConfig::parse(content).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = ReachConfig::parse(&serialized).expect("should reparse");

    assert_eq!(config.trace.max_hops, reparsed.trace.max_hops);
    assert_eq!(config.general.log_level, reparsed.general.log_level);
}
