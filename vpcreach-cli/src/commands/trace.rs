//! `vpcreach trace` command handler

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use vpcreach_analyzer::{
    Analysis, Analyzer, DnsResolver, HostResolver, ResourceCollection, ResourceProvider,
    SnapshotProvider,
};
use vpcreach_core::config::ReachConfig;
use vpcreach_core::error::ReachError;
use vpcreach_core::traffic::TrafficContent;

use crate::cli::TraceArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `trace` command.
///
/// Loads the resource snapshot, runs the analysis, renders the report and
/// then checks `--assert-reachable` / `--assert-not-reachable`.
pub async fn execute(
    args: TraceArgs,
    config: &ReachConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let snapshot_path = args
        .snapshot
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.provider.snapshot_path));
    let provider = SnapshotProvider::load(config.provider.domain.as_str(), &snapshot_path).await?;

    let report = run(Arc::new(provider), DnsResolver, config, &args).await?;
    writer.render(&report)?;

    check_expectation(&args, &report)
}

/// Run the analysis and build the report.
///
/// Ctrl-C cancels every in-flight branch; the partial result is still reported.
pub async fn run<P: ResourceProvider, H: HostResolver>(
    provider: Arc<P>,
    hosts: H,
    config: &ReachConfig,
    args: &TraceArgs,
) -> Result<ReachabilityReport, CliError> {
    let analyzer = Analyzer::new(provider, hosts, config);

    let cancel = analyzer.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling trace");
            cancel.cancel();
        }
    });

    let result = analyzer.analyze(&args.source, &args.destination).await;
    interrupt.abort();

    let analysis = result?;
    let report = build_report(&analysis, &args.source, &args.destination, args.paths)?;
    info!(
        source = %args.source,
        destination = %args.destination,
        reachable = report.reachable,
        "trace finished"
    );
    Ok(report)
}

fn build_report(
    analysis: &Analysis,
    source: &str,
    destination: &str,
    show_paths: bool,
) -> Result<ReachabilityReport, CliError> {
    let traffic = analysis.traffic().map_err(ReachError::from)?.clone();
    let reachable = analysis.is_reachable().map_err(ReachError::from)?;

    let resources = show_paths.then(|| analysis.resources().clone());
    let paths = if show_paths {
        analysis
            .vectors()
            .iter()
            .flat_map(|v| {
                v.paths.iter().map(move |p| PathReport {
                    vector: v.vector.to_string(),
                    path: p.path.to_string(),
                    forward: p.forward.clone(),
                    return_traffic: p.return_traffic.clone(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(ReachabilityReport {
        source: source.to_owned(),
        destination: destination.to_owned(),
        reachable,
        traffic,
        paths,
        explanation: analysis.explain_unreachable(),
        timed_out: analysis.timed_out(),
        resources,
    })
}

fn check_expectation(args: &TraceArgs, report: &ReachabilityReport) -> Result<(), CliError> {
    if args.assert_reachable && !report.reachable {
        return Err(CliError::AssertionFailed(format!(
            "expected traffic from {} to {}, but none is allowed",
            report.source, report.destination
        )));
    }
    if args.assert_not_reachable && report.reachable {
        return Err(CliError::AssertionFailed(format!(
            "expected no traffic from {} to {}, but {} is allowed",
            report.source, report.destination, report.traffic
        )));
    }
    Ok(())
}

/// Reachability result for one source/destination pair.
#[derive(Debug, Serialize)]
pub struct ReachabilityReport {
    pub source: String,
    pub destination: String,
    pub reachable: bool,
    pub traffic: TrafficContent,
    /// Per-path detail, only filled with `--paths`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explanation: Vec<String>,
    pub timed_out: bool,
    /// Every resource consulted during the trace, JSON only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCollection>,
}

/// One discovered path.
#[derive(Debug, Serialize)]
pub struct PathReport {
    pub vector: String,
    pub path: String,
    pub forward: TrafficContent,
    #[serde(rename = "return")]
    pub return_traffic: TrafficContent,
}

fn write_traffic(w: &mut dyn Write, indent: &str, traffic: &TrafficContent) -> std::io::Result<()> {
    if traffic.is_all() || traffic.is_none() {
        return writeln!(w, "{indent}{traffic}");
    }
    for (protocol, items) in traffic.describe() {
        writeln!(w, "{indent}{protocol}: {}", items.join(", "))?;
    }
    Ok(())
}

impl Render for ReachabilityReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Reachability: {} -> {}", self.source.bold(), self.destination.bold())?;

        if self.reachable {
            writeln!(w, "  Result: {}", "REACHABLE".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "NOT REACHABLE".red().bold())?;
        }

        writeln!(w, "  Traffic:")?;
        write_traffic(w, "    ", &self.traffic)?;

        if !self.paths.is_empty() {
            writeln!(w)?;
            writeln!(w, "  Paths ({}):", self.paths.len())?;
            for (i, path) in self.paths.iter().enumerate() {
                writeln!(w, "    [{}] {}", i + 1, path.vector.cyan())?;
                writeln!(w, "        via: {}", path.path)?;
                writeln!(w, "        forward:")?;
                write_traffic(w, "          ", &path.forward)?;
                writeln!(w, "        return:")?;
                write_traffic(w, "          ", &path.return_traffic)?;
            }
        }

        if !self.explanation.is_empty() {
            writeln!(w)?;
            writeln!(w, "  Why:")?;
            for reason in &self.explanation {
                writeln!(w, "    - {}", reason.yellow())?;
            }
        }

        if self.timed_out {
            writeln!(
                w,
                "  {}",
                "Warning: trace timed out, results may be incomplete".yellow()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpcreach_core::traffic::PortSet;

    fn args(assert_reachable: bool, assert_not_reachable: bool) -> TraceArgs {
        TraceArgs {
            source: "ec2:web".to_owned(),
            destination: "ec2:app".to_owned(),
            paths: false,
            assert_reachable,
            assert_not_reachable,
            snapshot: None,
        }
    }

    fn report(traffic: TrafficContent) -> ReachabilityReport {
        ReachabilityReport {
            source: "ec2:web".to_owned(),
            destination: "ec2:app".to_owned(),
            reachable: !traffic.is_none(),
            traffic,
            paths: Vec::new(),
            explanation: Vec::new(),
            timed_out: false,
            resources: None,
        }
    }

    fn render(report: &ReachabilityReport) -> String {
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_render_reachable_lists_protocols() {
        let output = render(&report(TrafficContent::tcp(PortSet::single(8080))));
        assert!(output.contains("REACHABLE"));
        assert!(output.contains("ec2:web"));
        assert!(output.contains("tcp"), "should list the protocol");
        assert!(output.contains("8080"), "should list the port");
        assert!(!output.contains("Paths"), "paths are hidden by default");
    }

    #[test]
    fn test_render_unreachable_with_explanation() {
        let mut r = report(TrafficContent::none());
        r.explanation = vec!["network-acl acl-private admits no traffic".to_owned()];
        r.timed_out = true;

        let output = render(&r);
        assert!(output.contains("NOT REACHABLE"));
        assert!(output.contains("no traffic"));
        assert!(output.contains("acl-private"));
        assert!(output.contains("timed out"));
    }

    #[test]
    fn test_render_paths() {
        let mut r = report(TrafficContent::all());
        r.paths = vec![PathReport {
            vector: "eni-web (10.0.1.10) -> eni-app (10.0.2.20)".to_owned(),
            path: "aws:network-interface:eni-web -> aws:network-interface:eni-app".to_owned(),
            forward: TrafficContent::all(),
            return_traffic: TrafficContent::none(),
        }];

        let output = render(&r);
        assert!(output.contains("Paths (1)"));
        assert!(output.contains("[1]"));
        assert!(output.contains("forward:"));
        assert!(output.contains("all traffic"));
        assert!(output.contains("return:"));
    }

    #[test]
    fn test_json_uses_return_key_and_skips_empty_lists() {
        let mut r = report(TrafficContent::all());
        r.paths = vec![PathReport {
            vector: "a -> b".to_owned(),
            path: "a -> b".to_owned(),
            forward: TrafficContent::all(),
            return_traffic: TrafficContent::all(),
        }];

        let value = serde_json::to_value(&r).expect("should serialize");
        assert_eq!(value["reachable"], serde_json::json!(true));
        assert_eq!(value["traffic"], serde_json::json!("all traffic"));
        assert!(value["paths"][0].get("return").is_some());
        assert!(value.get("explanation").is_none());
        assert!(value.get("resources").is_none());
    }

    #[test]
    fn test_expectation_reachable_fails_without_traffic() {
        let result = check_expectation(&args(true, false), &report(TrafficContent::none()));
        match result {
            Err(e @ CliError::AssertionFailed(_)) => assert_eq!(e.exit_code(), 2),
            _ => panic!("expected AssertionFailed"),
        }
    }

    #[test]
    fn test_expectation_not_reachable_fails_with_traffic() {
        let result = check_expectation(
            &args(false, true),
            &report(TrafficContent::tcp(PortSet::single(22))),
        );
        assert!(matches!(result, Err(CliError::AssertionFailed(_))));
    }

    #[test]
    fn test_expectation_holds() {
        assert!(check_expectation(&args(true, false), &report(TrafficContent::all())).is_ok());
        assert!(check_expectation(&args(false, true), &report(TrafficContent::none())).is_ok());
        assert!(check_expectation(&args(false, false), &report(TrafficContent::none())).is_ok());
    }
}
