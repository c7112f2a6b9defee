//! 에러 타입: 도메인별 에러 정의

/// vpcreach 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ReachError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 트래픽 집합 연산/값 검증 에러
    #[error("traffic error: {0}")]
    Traffic(#[from] TrafficError),

    /// 토폴로지 추적 에러
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// 분석기 에러 (프로바이더, 대상 해석 등)
    ///
    /// 원래 에러를 `source()` 로 돌려주므로 호출자가 다운캐스트할 수 있습니다.
    #[error("analysis error: {0}")]
    Analysis(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 트래픽 대수 에러
///
/// 값 검증 실패(잘못된 포트/ICMP/CIDR)와 프로토콜 불일치 연산을 구분합니다.
/// 어떤 경우에도 "빈 집합"으로 대체하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrafficError {
    /// 서로 다른 프로토콜의 내용을 합치거나 교차하려 함
    #[error("protocol mismatch: {left} vs {right}")]
    ProtocolMismatch { left: u8, right: u8 },

    /// 프로토콜 종류에 맞지 않는 내용 (예: ICMP 에 포트 집합)
    #[error("protocol {protocol} cannot carry {content}")]
    WrongContent { protocol: u8, content: &'static str },

    /// 포트 범위가 유효하지 않음
    #[error("invalid port range {low}-{high}")]
    InvalidPortRange { low: i64, high: i64 },

    /// 포트 표기 문자열 파싱 실패
    #[error("invalid port specification '{0}'")]
    InvalidPortSpec(String),

    /// ICMP type/code 가 [0,255] 범위를 벗어남
    #[error("invalid icmp {field}: {value} (must be 0-255 or -1)")]
    InvalidIcmp { field: &'static str, value: i64 },

    /// CIDR 파싱 실패
    #[error("invalid cidr '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    /// 알 수 없는 프로토콜 이름/번호
    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),
}

/// 토폴로지 추적 에러
///
/// 추적 트리의 한 가지(branch)만 중단시키며, 결과 스트림을 통해 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// 이미 방문한 리소스로 되돌아옴
    #[error("loop detected at {reference}")]
    Loop { reference: String },

    /// 더 이상 진행할 엣지가 없음
    #[error("dead end at {reference}: {reason}")]
    DeadEnd { reference: String, reason: String },

    /// 컬렉션/프로바이더에 리소스가 없음
    #[error("missing resource {reference}")]
    MissingResource { reference: String },

    /// 경로 길이 제한 초과
    #[error("path exceeded {max_hops} hops at {reference}")]
    TooManyHops { reference: String, max_hops: usize },

    /// 추적이 취소됨
    #[error("trace cancelled")]
    Cancelled,
}
