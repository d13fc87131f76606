//! Values the build host provides about the current build

use std::collections::HashMap;
use std::process::ExitCode;
use tracing::error;

use crate::error::NotifyError;
use crate::utils::parse_flag;

/// Source of environment variables, so configuration can be resolved
/// without touching the process environment.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Data extracted from the build host environment
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    /// True for a local/offline run, false inside the real CI build
    pub is_local: bool,
    pub commit_ref: Option<String>,
    pub repository_url: Option<String>,
    /// Deploy context name (production, deploy-preview, ...)
    pub deploy_context: Option<String>,
    pub publish_dir: Option<String>,
}

impl HostContext {
    /// Reads the host values. `IS_LOCAL` wins when set, otherwise a build is
    /// considered remote only when `NETLIFY=true`.
    pub fn from_env(env: &impl EnvSource) -> Self {
        let is_local = match env.var("IS_LOCAL").as_deref().and_then(parse_flag) {
            Some(local) => local,
            None => env.var("NETLIFY").as_deref().and_then(parse_flag) != Some(true),
        };

        Self {
            is_local,
            commit_ref: env.var("COMMIT_REF"),
            repository_url: env.var("REPOSITORY_URL"),
            deploy_context: env.var("CONTEXT"),
            publish_dir: env.var("PUBLISH_DIR"),
        }
    }

    /// Minimal context for a CI run (used by tests and callers embedding the notifier)
    pub fn ci(commit_ref: &str, repository_url: &str) -> Self {
        Self {
            is_local: false,
            commit_ref: Some(commit_ref.to_string()),
            repository_url: Some(repository_url.to_string()),
            deploy_context: None,
            publish_dir: None,
        }
    }

    pub fn local() -> Self {
        Self {
            is_local: true,
            ..Self::default()
        }
    }
}

/// Reports a failed notification to the build host: one line on stderr and
/// a failing exit status.
pub fn fail_build(err: &NotifyError) -> ExitCode {
    error!("Build failed: {}", err);
    eprintln!("{}", failure_summary(err));
    ExitCode::FAILURE
}

/// The single line shown to the user for a failed build
pub fn failure_summary(err: &NotifyError) -> String {
    let message = err.to_string();
    format!("Build failed: {}", message.lines().next().unwrap_or_default().trim_end())
}
