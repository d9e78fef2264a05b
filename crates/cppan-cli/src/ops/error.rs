//! Failures that reach the process boundary

use cppan_core::io::download::DownloadError;
use thiserror::Error;

use crate::cmd::self_upgrade::UpgradeError;
use crate::ops::context::BootstrapError;

/// Every error `main` can see. Each maps to exit status 1.
#[derive(Error, Debug)]
pub enum CliError {
    /// Wrong operand count or malformed options; carries the usage text.
    #[error("{0}")]
    Usage(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("Network error: {0}")]
    Network(#[from] DownloadError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Failed to replace the executable ({stage}): {source}")]
    ReplaceFailure {
        stage: &'static str,
        source: std::io::Error,
    },

    /// Raised by the configuration or build collaborators, passed through.
    #[error("{0:#}")]
    Config(anyhow::Error),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("unexpected failure: {0:#}")]
    Unhandled(anyhow::Error),
}

impl From<UpgradeError> for CliError {
    fn from(err: UpgradeError) -> Self {
        match err {
            UpgradeError::Network(e) => Self::Network(e),
            UpgradeError::ChecksumMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            UpgradeError::ReplaceFailure { stage, source } => Self::ReplaceFailure { stage, source },
            other => Self::Unhandled(other.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Unhandled(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_errors_keep_their_kind() {
        let err: CliError = UpgradeError::ChecksumMismatch {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        }
        .into();
        assert!(matches!(err, CliError::ChecksumMismatch { .. }));
        assert_eq!(err.to_string(), "checksum mismatch: expected aa, got bb");

        let err: CliError = UpgradeError::MissingBinary("cppan".to_string()).into();
        assert!(matches!(err, CliError::Unhandled(_)));
    }

    #[test]
    fn test_config_errors_pass_through_with_context() {
        let err = CliError::Config(anyhow::anyhow!("no projects").context("Failed to process"));
        assert_eq!(err.to_string(), "Failed to process: no projects");
    }
}
