//! 동시 경로 추적기
//!
//! 출발 참조에서 목적지 참조까지 토폴로지 그래프를 따라가며 경로를 만듭니다.
//! 엣지마다 tokio 태스크를 하나씩 띄우고, 모든 태스크는 하나의 `mpsc` 결과
//! 스트림으로 경로 또는 가지 실패를 보냅니다.
//!
//! ```text
//!            ┌─ branch(b) ─┬─ branch(d) ──▶ Path
//! branch(a) ─┤             └─ branch(e) ──▶ Failure(DeadEnd)
//!            └─ branch(c) ──▶ Failure(Loop)
//!                     │
//!                     ▼
//!               mpsc::Receiver<TraceEvent>
//! ```
//!
//! - 동시에 확장 중인 가지 수는 `Semaphore` 로 제한합니다. 허가는 노드 로딩과
//!   엣지 계산 동안만 잡고, 자식 태스크를 띄우기 전에 반환합니다.
//! - `CancellationToken` 은 허가 대기, 확장 중, 결과 전송 시점마다 확인합니다.
//! - 토폴로지가 아닌 실패(프로바이더, 규칙)가 하나라도 오면 토큰을 취소해
//!   남은 가지를 모두 멈춥니다.
//! - 경로 도착 순서는 보장하지 않습니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vpcreach_core::config::TraceConfig;
use vpcreach_core::error::TopologyError;
use vpcreach_core::metrics as m;
use vpcreach_core::topology::{Edge, Factor, Path, Point, ResourceReference};

use crate::error::AnalyzerError;

/// 추적에 참여하는 토폴로지 노드의 능력
pub trait Traceable: Send + Sync + 'static {
    fn reference(&self) -> &ResourceReference;

    /// 이미 경로에 있는 노드를 다시 방문해도 되는지
    fn visitable(&self, already_visited: bool) -> bool;

    /// 이 노드에서 새 세그먼트가 시작되는지 (주소 변환 경계)
    fn segments(&self) -> bool;

    fn factors(&self) -> &[Factor];

    /// 다음 홉 목록
    fn forward_edges(&self) -> impl Future<Output = Result<Vec<Edge>, AnalyzerError>> + Send;
}

/// 엣지를 노드로 바꾸는 그래프
pub trait TraceSource: Send + Sync + 'static {
    type Node: Traceable;

    /// `edge.end` 노드를 로드합니다. `previous` 는 경로의 직전 지점입니다.
    fn load(
        &self,
        edge: &Edge,
        previous: Option<&ResourceReference>,
    ) -> impl Future<Output = Result<Self::Node, AnalyzerError>> + Send;
}

/// 추적 실행 옵션
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub max_in_flight: usize,
    pub channel_capacity: usize,
    pub max_hops: usize,
    pub timeout: Option<Duration>,
    pub fail_fast: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self::from(&TraceConfig::default())
    }
}

impl From<&TraceConfig> for TraceOptions {
    fn from(config: &TraceConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight.max(1),
            channel_capacity: config.channel_capacity.max(1),
            max_hops: config.max_hops,
            timeout: config.timeout(),
            fail_fast: config.fail_fast,
        }
    }
}

/// 실패한 가지
#[derive(Debug, Clone)]
pub struct BranchFailure {
    /// 확장하려던 참조
    pub reference: ResourceReference,
    /// 실패 직전까지의 경로
    pub partial: Path,
    pub error: AnalyzerError,
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partial.is_empty() {
            write!(f, "{}: {}", self.reference, self.error)
        } else {
            write!(f, "{} (after {}): {}", self.reference, self.partial, self.error)
        }
    }
}

/// 결과 스트림 항목
#[derive(Debug, Clone)]
pub enum TraceEvent {
    Path(Path),
    Failure(BranchFailure),
}

struct Shared<S> {
    source: Arc<S>,
    destination: ResourceReference,
    max_hops: usize,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

enum Step {
    Complete(Path),
    Continue(Path, Vec<Edge>),
}

/// 동시 경로 추적기
pub struct Tracer<S> {
    source: Arc<S>,
    options: TraceOptions,
    cancel: CancellationToken,
}

impl<S: TraceSource> Tracer<S> {
    pub fn new(source: S, options: TraceOptions) -> Self {
        Self {
            source: Arc::new(source),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// 외부 취소 토큰을 사용합니다.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 추적을 시작하고 결과 스트림을 돌려줍니다.
    ///
    /// `start.end` 가 출발 참조이며, 첫 지점에는 들어오는 엣지가 기록되지
    /// 않습니다. 모든 가지가 끝나면 스트림이 닫힙니다.
    pub fn trace(&self, start: Edge, destination: ResourceReference) -> mpsc::Receiver<TraceEvent> {
        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let shared = Arc::new(Shared {
            source: self.source.clone(),
            destination,
            max_hops: self.options.max_hops,
            semaphore: Arc::new(Semaphore::new(self.options.max_in_flight.max(1))),
            cancel: self.cancel.clone(),
        });
        tokio::spawn(branch(shared, start, Path::new(), tx));
        rx
    }

    /// 추적을 끝까지 실행하고 결과를 모읍니다.
    pub async fn run(&self, start: Edge, destination: ResourceReference) -> TraceReport {
        let origin = start.end.clone();
        let rx = self.trace(start, destination);
        let mut report = TraceReport::collect(
            rx,
            &self.cancel,
            self.options.timeout,
            self.options.fail_fast,
        )
        .await;
        if report.timed_out {
            report.failures.push(BranchFailure {
                reference: origin,
                partial: Path::new(),
                error: TopologyError::Cancelled.into(),
            });
        }
        report
    }
}

fn branch<S: TraceSource>(
    shared: Arc<Shared<S>>,
    edge: Edge,
    path: Path,
    tx: mpsc::Sender<TraceEvent>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        if shared.cancel.is_cancelled() {
            return;
        }
        metrics::counter!(m::TRACE_BRANCHES_TOTAL).increment(1);

        let permit = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            permit = shared.semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };
        let outcome = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            outcome = expand(&shared, &edge, &path) => outcome,
        };
        drop(permit);

        match outcome {
            Ok(Step::Complete(complete)) => {
                debug!(path = %complete, "path complete");
                metrics::counter!(m::TRACE_PATHS_TOTAL).increment(1);
                emit(&tx, &shared.cancel, TraceEvent::Path(complete)).await;
            }
            Ok(Step::Continue(extended, edges)) => {
                for next in edges {
                    if shared.cancel.is_cancelled() {
                        return;
                    }
                    tokio::spawn(branch(shared.clone(), next, extended.clone(), tx.clone()));
                }
            }
            Err(error) => {
                warn!(reference = %edge.end, error = %error, "trace branch failed");
                metrics::counter!(
                    m::TRACE_FAILURES_TOTAL,
                    m::LABEL_REASON => error.reason_label()
                )
                .increment(1);
                let failure = BranchFailure {
                    reference: edge.end.clone(),
                    partial: path,
                    error,
                };
                emit(&tx, &shared.cancel, TraceEvent::Failure(failure)).await;
            }
        }
    })
}

async fn expand<S: TraceSource>(
    shared: &Shared<S>,
    edge: &Edge,
    path: &Path,
) -> Result<Step, AnalyzerError> {
    if path.len() >= shared.max_hops {
        return Err(TopologyError::TooManyHops {
            reference: edge.end.to_string(),
            max_hops: shared.max_hops,
        }
        .into());
    }

    let previous = path.last().map(|p| p.reference.clone());
    let node = shared.source.load(edge, previous.as_ref()).await?;
    let reference = node.reference().clone();

    if path.contains(&reference) && !node.visitable(true) {
        return Err(TopologyError::Loop {
            reference: reference.to_string(),
        }
        .into());
    }

    let point = Point::new(reference.clone(), node.factors().to_vec(), node.segments());
    let incoming = (!path.is_empty()).then(|| edge.clone());
    let extended = path.extend(incoming, point);
    debug!(reference = %reference, hops = extended.len(), "hop");

    if reference == shared.destination {
        return Ok(Step::Complete(extended));
    }

    let edges = node.forward_edges().await?;
    if edges.is_empty() {
        return Err(TopologyError::DeadEnd {
            reference: reference.to_string(),
            reason: "no forward edges".to_owned(),
        }
        .into());
    }
    Ok(Step::Continue(extended, edges))
}

async fn emit(tx: &mpsc::Sender<TraceEvent>, cancel: &CancellationToken, event: TraceEvent) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        result = tx.send(event) => {
            if result.is_err() {
                debug!("trace receiver dropped");
            }
        }
    }
}

/// 한 추적의 수집 결과
#[derive(Debug, Clone, Default)]
pub struct TraceReport {
    pub paths: Vec<Path>,
    pub failures: Vec<BranchFailure>,
    /// 제한 시간이 지나 취소됨
    pub timed_out: bool,
    /// 추적이 도중에 취소됨 (치명적 실패, `fail_fast` 또는 외부 취소)
    pub cancelled: bool,
}

impl TraceReport {
    /// 스트림이 닫히거나, 제한 시간이 지나거나, 치명적인 실패를 만나거나,
    /// `cancel` 이 외부에서 취소될 때까지 결과를 모읍니다. `fail_fast` 이면
    /// 토폴로지 실패에서도 멈춥니다. 스스로 멈출 때는 `cancel` 을 취소합니다.
    pub async fn collect(
        mut rx: mpsc::Receiver<TraceEvent>,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
        fail_fast: bool,
    ) -> Self {
        let mut report = Self::default();
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = expired => {
                    warn!("trace timed out, cancelling remaining branches");
                    report.timed_out = true;
                    cancel.cancel();
                    break;
                }
                event = rx.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            match event {
                TraceEvent::Path(path) => report.paths.push(path),
                TraceEvent::Failure(failure) => {
                    let fatal = failure.error.is_fatal();
                    report.failures.push(failure);
                    if fatal || fail_fast {
                        if fatal {
                            warn!("fatal branch failure, cancelling remaining branches");
                        }
                        cancel.cancel();
                        break;
                    }
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        report
    }

    pub fn is_complete(&self) -> bool {
        !self.paths.is_empty()
    }
}
