//! 설정 관리: vpcreach.toml 파싱 및 런타임 설정
//!
//! [`ReachConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VPCREACH_TRACE_MAX_IN_FLIGHT=16` 형식)
//! 3. 설정 파일 (`vpcreach.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vpcreach_core::error::ReachError> {
//! use vpcreach_core::config::ReachConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ReachConfig::load("vpcreach.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ReachConfig::parse("[trace]\nmax_hops = 16")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ReachError};

/// vpcreach 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReachConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 추적기 설정
    #[serde(default)]
    pub trace: TraceConfig,
    /// 리소스 프로바이더 설정
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl ReachConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ReachError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ReachError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReachError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ReachError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ReachError> {
        toml::from_str(toml_str).map_err(|e| {
            ReachError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VPCREACH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VPCREACH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VPCREACH_GENERAL_LOG_FORMAT");

        // Trace
        override_usize(
            &mut self.trace.max_in_flight,
            "VPCREACH_TRACE_MAX_IN_FLIGHT",
        );
        override_usize(
            &mut self.trace.channel_capacity,
            "VPCREACH_TRACE_CHANNEL_CAPACITY",
        );
        override_usize(&mut self.trace.max_hops, "VPCREACH_TRACE_MAX_HOPS");
        override_u64(&mut self.trace.timeout_secs, "VPCREACH_TRACE_TIMEOUT_SECS");
        override_bool(&mut self.trace.fail_fast, "VPCREACH_TRACE_FAIL_FAST");

        // Provider
        override_string(
            &mut self.provider.snapshot_path,
            "VPCREACH_PROVIDER_SNAPSHOT_PATH",
        );
        override_string(&mut self.provider.domain, "VPCREACH_PROVIDER_DOMAIN");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ReachError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.trace.max_in_flight == 0 {
            return Err(invalid("trace.max_in_flight", "must be greater than 0"));
        }
        if self.trace.channel_capacity == 0 {
            return Err(invalid("trace.channel_capacity", "must be greater than 0"));
        }
        if self.trace.max_hops == 0 {
            return Err(invalid("trace.max_hops", "must be greater than 0"));
        }

        if self.provider.domain.is_empty() {
            return Err(invalid("provider.domain", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ReachError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 추적기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// 동시에 확장 중인 가지 수 상한
    pub max_in_flight: usize,
    /// 결과 스트림 버퍼 크기
    pub channel_capacity: usize,
    /// 경로당 최대 홉 수
    pub max_hops: usize,
    /// 추적 전체 제한 시간 (초, 0 이면 무제한)
    pub timeout_secs: u64,
    /// 첫 가지 실패 시 전체 추적 취소
    pub fail_fast: bool,
}

impl TraceConfig {
    /// 제한 시간 (`timeout_secs == 0` 이면 None)
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            channel_capacity: 256,
            max_hops: 32,
            timeout_secs: 30,
            fail_fast: false,
        }
    }
}

/// 리소스 프로바이더 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 리소스 스냅샷 JSON 경로
    pub snapshot_path: String,
    /// 리소스 참조의 도메인
    pub domain: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "vpcreach-snapshot.json".to_owned(),
            domain: "aws".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
