use std::io;
use std::path::PathBuf;

use crate::release::ReleaseStep;

/// Error type for the deployment notification run
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SentryCLI needs the {setting}. {hint}")]
    ConfigError {
        setting: &'static str,
        hint: &'static str,
    },

    #[error("Plugin configuration error: {0}")]
    InputFileError(String),

    #[error("Failed to write credentials file '{}': {source}", path.display())]
    CredentialError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("SentryCLI failed to {phase}: {message}")]
    RemoteError { phase: ReleaseStep, message: String },

    #[error(
        "SentryCLI failed to set commits. You likely need to set up a repository or repository integration. \
         Read more: https://docs.sentry.io/workflow/releases/?platform=python#install-repo-integration\n{message}"
    )]
    CommitIntegrationError { message: String },

    #[error("Failed to delete credentials file '{}': {source}", path.display())]
    CleanupError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl NotifyError {
    /// The step a remote failure happened in, if any
    pub fn phase(&self) -> Option<ReleaseStep> {
        match self {
            NotifyError::RemoteError { phase, .. } => Some(*phase),
            NotifyError::CommitIntegrationError { .. } => Some(ReleaseStep::SetCommits),
            _ => None,
        }
    }
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;
