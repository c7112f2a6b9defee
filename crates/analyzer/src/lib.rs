//! vpcreach 도달성 분석기
//!
//! 리소스 스냅샷 위에서 두 대상 사이의 네트워크 경로를 추적하고, 경로마다
//! 허용되는 트래픽을 계산해 합칩니다.
//!
//! # 모듈 구성
//!
//! - [`resource`]: AWS 리소스 모델 (인스턴스, ENI, SG, NACL, 서브넷, 라우트 테이블, 게이트웨이)
//! - [`provider`]: 리소스 프로바이더 트레이트와 JSON 스냅샷 구현
//! - [`collection`]: 분석 1회 단위 리소스 컬렉션과 캐시 프로바이더
//! - [`rule`]: 보안 그룹/NACL/인스턴스 상태 팩터 계산
//! - [`tracer`]: `Traceable` 그래프 위의 동시 경로 추적기
//! - [`graph`]: AWS 리소스 위의 추적 그래프
//! - [`point`]: 끝점과 벡터
//! - [`subject`]: 대상 식별자 파싱과 해석
//! - [`analysis`]: 경로별 트래픽 계산과 최종 집계
//! - [`error`]: 분석기 에러 타입
//!
//! # 사용 예시
//!
//! ```no_run
//! use std::sync::Arc;
//! use vpcreach_analyzer::{Analyzer, DnsResolver, SnapshotProvider};
//! use vpcreach_core::ReachConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReachConfig::default();
//! let provider = SnapshotProvider::load("aws", "vpcreach-snapshot.json").await?;
//! let analyzer = Analyzer::new(Arc::new(provider), DnsResolver, &config);
//! let analysis = analyzer.analyze("ec2:web", "ec2:db").await?;
//! println!("{}", analysis.traffic()?);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod collection;
pub mod error;
pub mod graph;
pub mod point;
pub mod provider;
pub mod resource;
pub mod rule;
pub mod subject;
pub mod tracer;

pub use analysis::{Analysis, Analyzer, PathResult, VectorResult};
pub use collection::{CachedProvider, ResourceCollection};
pub use error::{AnalyzerError, ProviderError, SubjectError};
pub use graph::AwsGraph;
pub use point::{NetworkPoint, NetworkVector};
pub use provider::{ResourceProvider, Snapshot, SnapshotProvider};
pub use resource::Resource;
pub use subject::{DnsResolver, HostResolver, Identifier, Role, StaticResolver, Subject};
pub use tracer::{
    BranchFailure, TraceEvent, TraceOptions, TraceReport, TraceSource, Traceable, Tracer,
};
