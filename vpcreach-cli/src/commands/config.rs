//! `vpcreach config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use vpcreach_core::config::ReachConfig;
use vpcreach_core::error::{ConfigError, ReachError};

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: &str = "general, trace, provider";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load the effective configuration.
///
/// A missing file is not an error: defaults are used, with env overrides
/// applied on top. The returned flag is `true` in that case.
pub async fn load_effective(config_path: &Path) -> Result<(ReachConfig, bool), CliError> {
    match ReachConfig::load(config_path).await {
        Ok(config) => Ok((config, false)),
        Err(ReachError::Config(ConfigError::FileNotFound { .. })) => {
            let mut config = ReachConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok((config, true))
        }
        Err(e) => Err(e.into()),
    }
}

/// Execute the config validate subcommand.
///
/// A configuration that loads but points at a missing snapshot is valid
/// with a warning, since `trace --snapshot` can still supply one.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, unparsable or has invalid values.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let mut report = ConfigValidationReport::new(config_path);
    match ReachConfig::load(config_path).await {
        Ok(config) => {
            let snapshot = Path::new(&config.provider.snapshot_path);
            if !tokio::fs::try_exists(snapshot).await.unwrap_or(false) {
                report.warnings.push(format!(
                    "provider.snapshot_path {} does not exist",
                    snapshot.display()
                ));
            }
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    writer.render(&report)?;

    if !report.is_valid() {
        return Err(CliError::Config(format!(
            "{} failed validation",
            config_path.display()
        )));
    }
    Ok(())
}

/// Execute the config show subcommand.
///
/// Displays the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Command` if the section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let (config, defaulted) = load_effective(config_path).await?;
    let source = if defaulted {
        format!("{} (not found, using defaults)", config_path.display())
    } else {
        config_path.display().to_string()
    };

    let report = build_report(&config, source, section)?;
    writer.render(&report)?;

    Ok(())
}

fn build_report(
    config: &ReachConfig,
    source: String,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("trace") => toml::to_string_pretty(&config.trace),
        Some("provider") => toml::to_string_pretty(&config.provider),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {SECTIONS})"
            )));
        }
    }
    .unwrap_or_else(|e| format!("(serialization error: {e})"));

    Ok(ConfigReport {
        source,
        section,
        config_toml,
    })
}

/// Effective configuration for `config show`.
///
/// The text form is the TOML itself under a comment header, so it can be
/// redirected into a new config file.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let header = match &self.section {
            Some(section) => format!("# [{section}] from {}", self.source),
            None => format!("# effective configuration from {}", self.source),
        };
        writeln!(w, "{}", header.dimmed())?;
        write!(w, "{}", self.config_toml)
    }
}

/// Result of `config validate`.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConfigValidationReport {
    fn new(source: &Path) -> Self {
        Self {
            source: source.display().to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let verdict = if self.is_valid() {
            "ok".green().bold()
        } else {
            "invalid".red().bold()
        };
        writeln!(w, "{}: {verdict}", self.source)?;
        for err in &self.errors {
            writeln!(w, "  {} {err}", "error:".red())?;
        }
        for warning in &self.warnings {
            writeln!(w, "  {} {warning}", "warning:".yellow())?;
        }
        Ok(())
    }
}
