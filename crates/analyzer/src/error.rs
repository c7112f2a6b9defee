//! 분석기 에러 타입
//!
//! [`AnalyzerError`]는 리소스 조회, 대상 해석, 규칙 해석, 경로 추적에서 발생하는
//! 모든 에러를 표현합니다. `From<AnalyzerError> for ReachError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use vpcreach_core::error::{ReachError, TopologyError, TrafficError};

/// 리소스 프로바이더 에러
///
/// "찾을 수 없음"과 "권한 없음"은 절대 빈 결과로 바꾸지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// 리소스가 존재하지 않음
    #[error("resource not found: {reference}")]
    NotFound { reference: String },

    /// 조회 권한 없음
    #[error("not authorized to read {reference}: {reason}")]
    Unauthorized { reference: String, reason: String },

    /// 일시적인 조회 실패 (재시도 가능)
    #[error("transient failure reading {reference}: {reason}")]
    Transient { reference: String, reason: String },

    /// 스냅샷 파일 로딩 실패
    #[error("failed to load snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
}

/// 대상(source/destination) 해석 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    /// 빈 식별자
    #[error("{role} identifier is empty")]
    EmptyIdentifier { role: String },

    /// 알 수 없는 명시적 타입 접두어
    #[error("unknown subject type '{0}' (expected ip, host or ec2)")]
    UnknownType(String),

    /// IP 로 해석할 수 없는 `ip:` 식별자
    #[error("invalid ip address '{0}'")]
    InvalidAddress(String),

    /// 일치하는 대상 없음
    #[error("no match for '{identifier}'")]
    NotFound { identifier: String },

    /// 여러 대상이 일치함
    #[error("'{identifier}' is ambiguous, candidates: {}", candidates.join(", "))]
    Ambiguous {
        identifier: String,
        candidates: Vec<String>,
    },

    /// 호스트 이름 조회 실패
    #[error("failed to resolve host '{host}': {reason}")]
    HostLookup { host: String, reason: String },
}

/// 분석기 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    /// 리소스 조회 실패
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 대상 해석 실패
    #[error(transparent)]
    Subject(#[from] SubjectError),

    /// 규칙/트래픽 값 에러
    #[error(transparent)]
    Traffic(#[from] TrafficError),

    /// 경로 추적 에러
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// 리소스 내용이 올바르지 않음 (예: 잘못된 주소 필드)
    #[error("malformed resource {reference}: {reason}")]
    Resource { reference: String, reason: String },
}

impl AnalyzerError {
    /// 분석 전체를 중단시키는 에러인지
    ///
    /// 토폴로지 에러는 한 가지만 실패시키고, 나머지는 모든 추적을 취소합니다.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Topology(_))
    }

    /// 메트릭 레이블용 실패 사유
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::Topology(TopologyError::Loop { .. }) => "loop",
            Self::Topology(TopologyError::DeadEnd { .. }) => "dead_end",
            Self::Topology(TopologyError::MissingResource { .. }) => "missing",
            Self::Topology(TopologyError::TooManyHops { .. }) => "too_many_hops",
            Self::Topology(TopologyError::Cancelled) => "cancelled",
            Self::Provider(_) => "provider",
            Self::Traffic(_) | Self::Resource { .. } => "invalid_rule",
            Self::Subject(_) => "subject",
        }
    }
}

impl From<AnalyzerError> for ReachError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::Traffic(e) => ReachError::Traffic(e),
            AnalyzerError::Topology(e) => ReachError::Topology(e),
            other => ReachError::Analysis(Box::new(other)),
        }
    }
}
