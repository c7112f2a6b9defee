//! Metrics recorder for `--metrics`.
//!
//! Installs an in-process Prometheus recorder with no HTTP listener. A trace
//! is a single short run, so the collected counters are written to stderr in
//! the Prometheus text format once the command finishes.

use std::io::Write;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::CliError;

/// Install the global metrics recorder and register metric descriptions.
///
/// Call at most once per process, after logging is initialised.
pub fn install_recorder() -> Result<PrometheusHandle, CliError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CliError::Metrics(format!("failed to install metrics recorder: {e}")))?;
    vpcreach_core::metrics::describe_all();
    tracing::debug!("metrics recorder installed");
    Ok(handle)
}

/// Write everything recorded so far under a `# metrics` header.
pub fn write_snapshot(handle: &PrometheusHandle, w: &mut dyn Write) -> Result<(), CliError> {
    writeln!(w, "# metrics")?;
    w.write_all(handle.render().as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpcreach_core::metrics as m;

    #[test]
    fn test_snapshot_contains_recorded_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            vpcreach_core::metrics::describe_all();
            metrics::counter!(m::TRACE_PATHS_TOTAL).increment(2);
            metrics::counter!(
                m::PROVIDER_FETCHES_TOTAL,
                m::LABEL_KIND => "subnet",
                m::LABEL_RESULT => "hit"
            )
            .increment(1);
        });

        let mut out = Vec::new();
        write_snapshot(&handle, &mut out).expect("snapshot should be written");
        let text = String::from_utf8(out).expect("valid UTF-8");

        assert!(text.starts_with("# metrics\n"));
        assert!(text.contains("vpcreach_trace_paths_total 2"), "got: {text}");
        assert!(text.contains("kind=\"subnet\""));
        assert!(text.contains("Total number of completed paths"), "descriptions are registered");
    }

    #[test]
    fn test_snapshot_without_recordings_has_only_header() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let mut out = Vec::new();
        write_snapshot(&recorder.handle(), &mut out).expect("snapshot should be written");
        assert_eq!(String::from_utf8(out).expect("valid UTF-8").trim(), "# metrics");
    }
}
