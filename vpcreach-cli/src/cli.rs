//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// vpcreach -- network reachability analysis for cloud networks.
///
/// Use `vpcreach <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "vpcreach", version, about, long_about = None)]
pub struct Cli {
    /// Path to the vpcreach.toml configuration file.
    #[arg(short, long, default_value = "vpcreach.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Print collected metrics to stderr in Prometheus text format on exit.
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace the traffic allowed from a source to a destination.
    Trace(TraceArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- trace ----

/// Trace reachability between two subjects.
///
/// Subjects are `ip:<addr>`, `host:<name>`, `ec2:<id-or-name>`, or a bare
/// value tried as an address, then a hostname, then an instance.
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Source subject.
    pub source: String,

    /// Destination subject.
    pub destination: String,

    /// Show every discovered path with its own traffic.
    #[arg(long)]
    pub paths: bool,

    /// Exit with code 2 unless some traffic is allowed.
    #[arg(long, conflicts_with = "assert_not_reachable")]
    pub assert_reachable: bool,

    /// Exit with code 2 if any traffic is allowed.
    #[arg(long)]
    pub assert_not_reachable: bool,

    /// Resource snapshot to analyse (overrides provider.snapshot_path).
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

// ---- config ----

/// Manage vpcreach configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, trace, provider).
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_trace_defaults() {
        let cli = Cli::try_parse_from(["vpcreach", "trace", "ec2:web", "10.0.0.5"])
            .expect("should parse 'trace' subcommand");
        match cli.command {
            Commands::Trace(args) => {
                assert_eq!(args.source, "ec2:web");
                assert_eq!(args.destination, "10.0.0.5");
                assert!(!args.paths, "paths should default to false");
                assert!(!args.assert_reachable);
                assert!(!args.assert_not_reachable);
                assert!(args.snapshot.is_none(), "snapshot should be None");
            }
            _ => panic!("expected Trace command"),
        }
    }

    #[test]
    fn test_cli_parse_trace_flags() {
        let cli = Cli::try_parse_from([
            "vpcreach",
            "trace",
            "web",
            "db",
            "--paths",
            "--assert-reachable",
            "--snapshot",
            "/tmp/snapshot.json",
        ])
        .expect("should parse trace flags");
        match cli.command {
            Commands::Trace(args) => {
                assert!(args.paths);
                assert!(args.assert_reachable);
                assert_eq!(args.snapshot, Some(PathBuf::from("/tmp/snapshot.json")));
            }
            _ => panic!("expected Trace command"),
        }
    }

    #[test]
    fn test_cli_parse_conflicting_assertions_fails() {
        let args = Cli::try_parse_from([
            "vpcreach",
            "trace",
            "a",
            "b",
            "--assert-reachable",
            "--assert-not-reachable",
        ]);
        assert!(args.is_err(), "assertion modes should conflict");
    }

    #[test]
    fn test_cli_parse_trace_missing_destination_fails() {
        let args = Cli::try_parse_from(["vpcreach", "trace", "ec2:web"]);
        assert!(args.is_err(), "destination is required");
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let cli = Cli::try_parse_from(["vpcreach", "config", "validate"])
            .expect("should parse 'config validate'");
        match cli.command {
            Commands::Config(config_args) => {
                assert!(matches!(config_args.action, ConfigAction::Validate));
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["vpcreach", "config", "show", "trace"])
            .expect("should parse 'config show trace'");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("trace".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_options() {
        let cli = Cli::try_parse_from([
            "vpcreach",
            "-c",
            "/custom/vpcreach.toml",
            "config",
            "show",
            "--log-level",
            "debug",
            "--output",
            "json",
        ])
        .expect("should parse global options");
        assert_eq!(cli.config, PathBuf::from("/custom/vpcreach.toml"));
        assert_eq!(cli.log_level, Some("debug".to_owned()));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(!cli.metrics, "metrics should default to false");
    }

    #[test]
    fn test_cli_parse_metrics_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["vpcreach", "trace", "web", "db", "--metrics"])
            .expect("should parse global --metrics");
        assert!(cli.metrics);
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        let args = Cli::try_parse_from(["vpcreach"]);
        assert!(args.is_err(), "should fail when no command provided");
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "vpcreach");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert!(subcommands.contains(&"trace"), "should have 'trace' subcommand");
        assert!(subcommands.contains(&"config"), "should have 'config' subcommand");
    }
}
