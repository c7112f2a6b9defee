//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았다면 호출은 아무 일도 하지 않으며,
//! 레코더를 설치하는 쪽(`vpcreach --metrics`)이 [`describe_all`]도 호출해야 합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `vpcreach_`
//! - 영역: `trace_`, `provider_`, `analysis_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 실패 사유 레이블 키 (loop, dead_end, missing, too_many_hops, cancelled, other)
pub const LABEL_REASON: &str = "reason";

/// 리소스 종류 레이블 키
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (hit, miss, error)
pub const LABEL_RESULT: &str = "result";

// ─── Tracer 메트릭 ─────────────────────────────────────────────────

/// Tracer: 확장한 가지 수 (counter)
pub const TRACE_BRANCHES_TOTAL: &str = "vpcreach_trace_branches_total";

/// Tracer: 완성된 경로 수 (counter)
pub const TRACE_PATHS_TOTAL: &str = "vpcreach_trace_paths_total";

/// Tracer: 실패한 가지 수 (counter, label: reason)
pub const TRACE_FAILURES_TOTAL: &str = "vpcreach_trace_failures_total";

// ─── Provider 메트릭 ───────────────────────────────────────────────

/// Provider: 리소스 조회 수 (counter, label: kind, result)
pub const PROVIDER_FETCHES_TOTAL: &str = "vpcreach_provider_fetches_total";

// ─── Analysis 메트릭 ───────────────────────────────────────────────

/// Analysis: 분석 1회 소요 시간 (histogram, 초)
pub const ANALYSIS_DURATION_SECONDS: &str = "vpcreach_analysis_duration_seconds";

/// 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        TRACE_BRANCHES_TOTAL,
        "Total number of trace branches expanded"
    );
    describe_counter!(TRACE_PATHS_TOTAL, "Total number of completed paths");
    describe_counter!(
        TRACE_FAILURES_TOTAL,
        "Trace branches that ended in an error, by reason"
    );
    describe_counter!(
        PROVIDER_FETCHES_TOTAL,
        "Resource lookups by kind and cache result"
    );
    describe_histogram!(
        ANALYSIS_DURATION_SECONDS,
        "Wall-clock duration of one reachability analysis in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        TRACE_BRANCHES_TOTAL,
        TRACE_PATHS_TOTAL,
        TRACE_FAILURES_TOTAL,
        PROVIDER_FETCHES_TOTAL,
        ANALYSIS_DURATION_SECONDS,
    ];

    #[test]
    fn all_metrics_start_with_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("vpcreach_"),
                "Metric '{}' does not start with 'vpcreach_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_REASON, LABEL_KIND, LABEL_RESULT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
