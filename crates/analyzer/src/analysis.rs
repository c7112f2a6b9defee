//! 도달성 분석 집계
//!
//! 경로 하나의 허용 트래픽은 모든 지점 팩터의 교집합이고(AND), 분석 전체의
//! 최종 트래픽은 완성된 모든 경로의 합집합입니다(OR).
//!
//! ```text
//! Analyzer::analyze(source, destination)
//!   ├─ Subject::parse × 2 → resolve → NetworkPoint 목록
//!   ├─ NetworkVector::between (같은 주소 체계의 모든 조합)
//!   ├─ 벡터마다 Tracer::run (JoinSet 으로 동시 실행)
//!   └─ Analysis { vectors, resources } → traffic() (OnceLock 메모)
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vpcreach_core::config::ReachConfig;
use vpcreach_core::error::{TopologyError, TrafficError};
use vpcreach_core::metrics as m;
use vpcreach_core::topology::Path;
use vpcreach_core::traffic::TrafficContent;

use crate::collection::{CachedProvider, ResourceCollection};
use crate::error::AnalyzerError;
use crate::graph::AwsGraph;
use crate::point::NetworkVector;
use crate::provider::ResourceProvider;
use crate::subject::{HostResolver, Role, Subject, resolve};
use crate::tracer::{BranchFailure, TraceOptions, TraceReport, Tracer};

/// 완성된 경로 하나와 그 경로가 허용하는 트래픽
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResult {
    pub path: Path,
    pub forward: TrafficContent,
    #[serde(rename = "return")]
    pub return_traffic: TrafficContent,
}

impl PathResult {
    /// 모든 지점의 정방향/응답 팩터를 각각 교집합합니다.
    pub fn from_path(path: Path) -> Result<Self, TrafficError> {
        let forward = TrafficContent::intersect_all(path.points().flat_map(|p| p.factors_forward()))?;
        let return_traffic =
            TrafficContent::intersect_all(path.points().flat_map(|p| p.factors_return()))?;
        Ok(Self {
            path,
            forward,
            return_traffic,
        })
    }
}

/// 벡터 하나의 추적 결과
#[derive(Debug, Clone, Serialize)]
pub struct VectorResult {
    pub vector: NetworkVector,
    pub paths: Vec<PathResult>,
    #[serde(skip)]
    pub failures: Vec<BranchFailure>,
    pub timed_out: bool,
}

impl VectorResult {
    pub fn from_report(vector: NetworkVector, report: TraceReport) -> Result<Self, TrafficError> {
        let paths = report
            .paths
            .into_iter()
            .map(PathResult::from_path)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            vector,
            paths,
            failures: report.failures,
            timed_out: report.timed_out,
        })
    }

    /// 이 벡터의 경로 합집합. 경로가 없으면 `None` 트래픽.
    pub fn traffic(&self) -> Result<TrafficContent, TrafficError> {
        TrafficContent::merge_all(self.paths.iter().map(|p| &p.forward))
    }
}

/// 분석 결과
#[derive(Debug)]
pub struct Analysis {
    vectors: Vec<VectorResult>,
    resources: ResourceCollection,
    final_traffic: OnceLock<TrafficContent>,
}

impl Analysis {
    pub fn new(vectors: Vec<VectorResult>, resources: ResourceCollection) -> Self {
        Self {
            vectors,
            resources,
            final_traffic: OnceLock::new(),
        }
    }

    pub fn vectors(&self) -> &[VectorResult] {
        &self.vectors
    }

    /// 분석 중 조회한 리소스
    pub fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathResult> {
        self.vectors.iter().flat_map(|v| v.paths.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchFailure> {
        self.vectors.iter().flat_map(|v| v.failures.iter())
    }

    /// 최종 트래픽 (처음 호출할 때 계산하고 이후에는 재사용)
    pub fn traffic(&self) -> Result<&TrafficContent, TrafficError> {
        if let Some(traffic) = self.final_traffic.get() {
            return Ok(traffic);
        }
        let merged = TrafficContent::merge_all(self.paths().map(|p| &p.forward))?;
        Ok(self.final_traffic.get_or_init(|| merged))
    }

    pub fn is_reachable(&self) -> Result<bool, TrafficError> {
        Ok(!self.traffic()?.is_none())
    }

    pub fn timed_out(&self) -> bool {
        self.vectors.iter().any(|v| v.timed_out)
    }

    /// 트래픽이 전혀 허용되지 않는 이유
    ///
    /// 실패한 가지의 사유와, 트래픽이 남지 않은 경로에서 전체를 허용하지 않는
    /// 팩터의 설명을 모읍니다. 도달 가능하면 빈 목록입니다.
    pub fn explain_unreachable(&self) -> Vec<String> {
        if self.is_reachable().unwrap_or(false) {
            return Vec::new();
        }
        if self.vectors.is_empty() {
            return vec!["no source and destination pair shares an address family".to_owned()];
        }

        let mut reasons: Vec<String> = self.failures().map(ToString::to_string).collect();
        for result in self.paths().filter(|r| r.forward.is_none()) {
            for factor in result.path.points().flat_map(|p| p.factors.iter()) {
                if factor.traffic_forward.is_all() {
                    continue;
                }
                let mut line = format!(
                    "{} {} admits {}",
                    factor.kind, factor.resource, factor.traffic_forward
                );
                if !factor.notes.is_empty() {
                    line.push_str(&format!(" ({})", factor.notes.join("; ")));
                }
                reasons.push(line);
            }
        }
        if reasons.is_empty() {
            reasons.push("no single factor blocks all traffic, but their intersection is empty".to_owned());
        }
        reasons.dedup();
        reasons
    }
}

/// 도달성 분석기
///
/// 분석마다 새 [`CachedProvider`]를 만들어 그 실행 동안만 리소스를 캐시합니다.
pub struct Analyzer<P, H> {
    provider: Arc<P>,
    hosts: H,
    domain: String,
    options: TraceOptions,
    cancel: CancellationToken,
}

impl<P: ResourceProvider, H: HostResolver> Analyzer<P, H> {
    pub fn new(provider: Arc<P>, hosts: H, config: &ReachConfig) -> Self {
        Self {
            provider,
            hosts,
            domain: config.provider.domain.clone(),
            options: TraceOptions::from(&config.trace),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: TraceOptions) -> Self {
        self.options = options;
        self
    }

    /// 진행 중인 모든 추적을 취소하는 토큰
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 두 대상 사이의 도달성을 분석합니다.
    ///
    /// 토폴로지 에러(루프, 막다른 길, 누락 리소스)는 해당 가지만 실패시키고
    /// 결과의 `failures` 에 남습니다. 프로바이더 에러와 규칙 에러는 처음 도착한
    /// 것을 호출자에게 그대로 전파하며, 그 즉시 다른 벡터의 추적도 취소합니다.
    pub async fn analyze(&self, source: &str, destination: &str) -> Result<Analysis, AnalyzerError> {
        let started = Instant::now();
        let source = Subject::parse(Role::Source, source)?;
        let destination = Subject::parse(Role::Destination, destination)?;

        let cached = Arc::new(CachedProvider::new(self.provider.clone(), self.domain.as_str()));
        let sources = resolve(&source, &cached, &self.hosts).await?;
        let destinations = resolve(&destination, &cached, &self.hosts).await?;
        let vectors = NetworkVector::between(&sources, &destinations);
        if vectors.is_empty() {
            warn!(source = %source, destination = %destination, "no traceable vector");
        }

        // 이 분석의 추적만 묶는 토큰. 반환하면서 남은 가지를 모두 멈춤
        let run_cancel = self.cancel.child_token();
        let _stop_on_return = run_cancel.clone().drop_guard();

        let mut tasks = JoinSet::new();
        for (index, vector) in vectors.into_iter().enumerate() {
            let tracer = Tracer::new(AwsGraph::new(cached.clone(), vector.clone()), self.options.clone())
                .with_cancel(run_cancel.child_token());
            tasks.spawn(async move {
                let report = tracer
                    .run(vector.start_edge(), vector.destination.reference.clone())
                    .await;
                (index, vector, report)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, vector, report) = joined.map_err(|e| {
                warn!(error = %e, "vector trace task failed");
                AnalyzerError::from(TopologyError::Cancelled)
            })?;
            let result = VectorResult::from_report(vector, report)?;
            if let Some(fatal) = result.failures.iter().find(|f| f.error.is_fatal()) {
                warn!(
                    vector = %result.vector,
                    error = %fatal.error,
                    "fatal trace failure, cancelling remaining vectors"
                );
                run_cancel.cancel();
                tasks.abort_all();
                return Err(fatal.error.clone());
            }
            results.push((index, result));
        }
        results.sort_by_key(|(index, _)| *index);
        let results: Vec<VectorResult> = results.into_iter().map(|(_, r)| r).collect();

        let analysis = Analysis::new(results, cached.snapshot().await);
        let traffic = analysis.traffic()?;
        metrics::histogram!(m::ANALYSIS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            source = %source,
            destination = %destination,
            vectors = analysis.vectors().len(),
            paths = analysis.paths().count(),
            failures = analysis.failures().count(),
            traffic = %traffic,
            "analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use vpcreach_core::topology::{Factor, FactorKind, Point, ResourceReference};
    use vpcreach_core::traffic::PortSet;

    use super::*;
    use crate::point::NetworkPoint;

    fn reference(id: &str) -> ResourceReference {
        ResourceReference::new("aws", "network-interface", id)
    }

    fn factor(forward: TrafficContent, backward: TrafficContent) -> Factor {
        Factor::new(FactorKind::SecurityGroup, reference("eni-a"), forward, backward)
    }

    fn path(factors: Vec<Vec<Factor>>) -> Path {
        factors
            .into_iter()
            .enumerate()
            .fold(Path::new(), |path, (i, factors)| {
                path.extend(None, Point::new(reference(&format!("eni-{i}")), factors, false))
            })
    }

    fn vector() -> NetworkVector {
        NetworkVector::new(
            NetworkPoint::external("aws", "1.1.1.1".parse().unwrap()),
            NetworkPoint::external("aws", "2.2.2.2".parse().unwrap()),
        )
    }

    fn vector_result(paths: Vec<Path>, failures: Vec<BranchFailure>) -> VectorResult {
        VectorResult {
            vector: vector(),
            paths: paths
                .into_iter()
                .map(|p| PathResult::from_path(p).unwrap())
                .collect(),
            failures,
            timed_out: false,
        }
    }

    #[test]
    fn path_traffic_is_intersection_of_every_hop() {
        let result = PathResult::from_path(path(vec![
            vec![factor(TrafficContent::all(), TrafficContent::all())],
            vec![factor(
                TrafficContent::tcp(PortSet::range(400, 500).unwrap()),
                TrafficContent::all(),
            )],
            vec![factor(
                TrafficContent::tcp(PortSet::single(443)),
                TrafficContent::udp(PortSet::all()),
            )],
        ]))
        .unwrap();
        assert_eq!(result.forward, TrafficContent::tcp(PortSet::single(443)));
        assert_eq!(result.return_traffic, TrafficContent::udp(PortSet::all()));
    }

    #[test]
    fn path_without_factors_admits_everything() {
        let result = PathResult::from_path(path(vec![Vec::new(), Vec::new()])).unwrap();
        assert!(result.forward.is_all());
    }

    #[test]
    fn final_traffic_is_union_of_paths() {
        let ssh = path(vec![vec![factor(
            TrafficContent::tcp(PortSet::single(22)),
            TrafficContent::all(),
        )]]);
        let https = path(vec![vec![factor(
            TrafficContent::tcp(PortSet::single(443)),
            TrafficContent::all(),
        )]]);
        let analysis = Analysis::new(
            vec![vector_result(vec![ssh], Vec::new()), vector_result(vec![https], Vec::new())],
            ResourceCollection::new(),
        );
        let traffic = analysis.traffic().unwrap();
        assert!(traffic.allows_tcp(22));
        assert!(traffic.allows_tcp(443));
        assert!(!traffic.allows_tcp(80));
        assert!(std::ptr::eq(traffic, analysis.traffic().unwrap()));
        assert!(analysis.explain_unreachable().is_empty());
    }

    #[test]
    fn failures_explain_empty_analysis() {
        let failure = BranchFailure {
            reference: reference("eni-b"),
            partial: Path::new(),
            error: TopologyError::DeadEnd {
                reference: "aws:subnet:subnet-1".to_owned(),
                reason: "no route".to_owned(),
            }
            .into(),
        };
        let analysis = Analysis::new(
            vec![vector_result(Vec::new(), vec![failure])],
            ResourceCollection::new(),
        );
        assert!(analysis.traffic().unwrap().is_none());
        assert!(!analysis.is_reachable().unwrap());
        let reasons = analysis.explain_unreachable();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("no route"));
    }

    #[test]
    fn blocking_factor_note_is_explained() {
        let stopped = factor(TrafficContent::none(), TrafficContent::none()).with_note("instance i-1 is stopped");
        let analysis = Analysis::new(
            vec![vector_result(vec![path(vec![vec![stopped]])], Vec::new())],
            ResourceCollection::new(),
        );
        let reasons = analysis.explain_unreachable();
        assert!(reasons.iter().any(|r| r.contains("stopped")));
    }

    #[test]
    fn no_vectors_is_unreachable() {
        let analysis = Analysis::new(Vec::new(), ResourceCollection::new());
        assert!(!analysis.is_reachable().unwrap());
        assert!(analysis.explain_unreachable()[0].contains("address family"));
    }
}
