//! vpcreach 공통 타입, 트래픽 대수, 에러, 설정
//!
//! # 모듈 구성
//!
//! - [`traffic`]: 16비트 비트셋 기반 트래픽 집합 대수 (ValueSet → TrafficContent)
//! - [`topology`]: 리소스 참조, 엣지, 팩터, 포인트, 세그먼트, 경로
//! - [`config`]: vpcreach.toml 설정
//! - [`error`]: 도메인 에러 타입
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod topology;
pub mod traffic;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ReachError, TopologyError, TrafficError};

// 설정
pub use config::{GeneralConfig, ProviderConfig, ReachConfig, TraceConfig};

// 토폴로지
pub use topology::{
    Direction, Edge, Factor, FactorKind, Hop, IpTuple, Path, Point, ResourceReference,
    RuleAction, RuleMatch, Segment,
};

// 트래픽
pub use traffic::{IcmpSet, IcmpVersion, PortSet, ProtocolContent, TrafficContent, ValueSet};
