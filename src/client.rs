//! Remote release operations and the sentry-cli backed implementation

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info};

use crate::utils::IGNORED_DIR;

pub const DEFAULT_SENTRY_CLI: &str = "sentry-cli";

/// Options for uploading build artifacts to a release
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub path: String,
    pub url_prefix: String,
}

/// The release-management operations of the error-tracking service.
///
/// Each call returns the command output on success or a human readable
/// failure message.
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    async fn new_release(&self, version: &str) -> Result<String, String>;

    async fn upload_sourcemaps(&self, version: &str, upload: &ArtifactUpload) -> Result<String, String>;

    /// `repository` is the `owner/repo` identifier known to Sentry
    async fn set_commits(&self, version: &str, repository: &str, commit: &str) -> Result<String, String>;

    async fn finalize(&self, version: &str) -> Result<String, String>;

    async fn new_deploy(&self, version: &str, environment: &str) -> Result<String, String>;
}

/// Runs sentry-cli subcommands from the directory holding `.sentryclirc`
#[derive(Debug, Clone)]
pub struct SentryCli {
    program: String,
    base_args: Vec<String>,
    working_dir: PathBuf,
}

impl SentryCli {
    /// `command_line` is split on whitespace so wrappers such as
    /// `npx @sentry/cli` work. An empty command line falls back to `sentry-cli`.
    pub fn new(command_line: &str, working_dir: impl AsRef<Path>) -> Self {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next().unwrap_or_else(|| DEFAULT_SENTRY_CLI.to_string());

        Self {
            program,
            base_args: parts.collect(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Full argument vector passed to the program for `args`
    pub fn command_args(&self, args: &[&str]) -> Vec<String> {
        self.base_args
            .iter()
            .cloned()
            .chain(args.iter().map(|a| a.to_string()))
            .collect()
    }

    async fn run(&self, args: &[&str]) -> Result<String, String> {
        let full_args = self.command_args(args);
        let cmd_str = format!("{} {}", self.program, full_args.join(" "));

        info!("Running (cwd = '{}'): {}", self.working_dir.display(), cmd_str);
        let output = Command::new(&self.program)
            .current_dir(&self.working_dir)
            .args(&full_args)
            .output()
            .await
            .map_err(|e| {
                let msg = format!("{} failed to start: {}", self.program, e);
                error!("{}", msg);
                msg
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            info!("{} output:\n{}", args.get(1).copied().unwrap_or("sentry-cli"), stdout.trim_end());
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let msg = format!(
                "`{}` exited with {}: {}",
                cmd_str,
                output.status,
                if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
            );
            error!("{}", msg);
            Err(msg)
        }
    }
}

#[async_trait]
impl ReleaseClient for SentryCli {
    async fn new_release(&self, version: &str) -> Result<String, String> {
        self.run(&["releases", "new", version]).await
    }

    async fn upload_sourcemaps(&self, version: &str, upload: &ArtifactUpload) -> Result<String, String> {
        self.run(&[
            "releases",
            "files",
            version,
            "upload-sourcemaps",
            upload.path.as_str(),
            "--url-prefix",
            upload.url_prefix.as_str(),
            "--rewrite",
            "--ignore",
            IGNORED_DIR,
        ])
        .await
    }

    async fn set_commits(&self, version: &str, repository: &str, commit: &str) -> Result<String, String> {
        let spec = format!("{}@{}", repository, commit);
        self.run(&["releases", "set-commits", version, "--commit", spec.as_str()]).await
    }

    async fn finalize(&self, version: &str) -> Result<String, String> {
        self.run(&["releases", "finalize", version]).await
    }

    async fn new_deploy(&self, version: &str, environment: &str) -> Result<String, String> {
        self.run(&["releases", "deploys", version, "new", "-e", environment]).await
    }
}
