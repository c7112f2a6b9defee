//! vpcreach CLI entry point.
//!
//! Parses arguments, loads the effective configuration, initialises logging
//! (and the metrics recorder with `--metrics`) and dispatches to the
//! subcommand handlers.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::debug;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (mut config, defaulted) = commands::config::load_effective(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    logging::init_tracing(&config.general)?;
    if defaulted {
        debug!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let recorder = if cli.metrics {
        Some(telemetry::install_recorder()?)
    } else {
        None
    };

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Trace(args) => commands::trace::execute(args, &config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    };

    if let Some(handle) = recorder {
        telemetry::write_snapshot(&handle, &mut std::io::stderr().lock())?;
    }
    result
}
