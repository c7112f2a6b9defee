//! CLI-specific error types and exit code mapping

use vpcreach_analyzer::{AnalyzerError, ProviderError};
use vpcreach_core::error::ReachError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// `--assert-reachable` / `--assert-not-reachable` did not hold.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// Logging could not be initialised.
    #[error("logging error: {0}")]
    Logging(String),

    /// The metrics recorder could not be installed.
    #[error("metrics error: {0}")]
    Metrics(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from vpcreach-core.
    #[error("{0}")]
    Core(#[from] ReachError),

    /// Analysis failure (provider, subject resolution, rules).
    #[error("{0}")]
    Analysis(#[from] AnalyzerError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                    |
    /// |------|----------------------------|
    /// | 0    | Success                    |
    /// | 1    | General / unexpected error |
    /// | 2    | Assertion failed           |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::AssertionFailed(_) => 2,
            Self::Config(_)
            | Self::Command(_)
            | Self::Logging(_)
            | Self::Metrics(_)
            | Self::JsonSerialize(_)
            | Self::Io(_)
            | Self::Core(_)
            | Self::Analysis(_) => 1,
        }
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        Self::Analysis(e.into())
    }
}
