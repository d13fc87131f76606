//! Deployment notification pipeline: validate, write credentials, run the
//! release steps in order, clean up.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::client::{ArtifactUpload, ReleaseClient};
use crate::credentials::{CREDENTIALS_FILE_NAME, Credentials, write_credentials};
use crate::error::{NotifyError, Result};
use crate::host::HostContext;
use crate::release::{ReleaseReport, ReleaseStep, StepRecord, StepStatus};
use crate::utils::{count_artifacts, repository_slug};
use crate::{DEFAULT_SOURCE_MAP_URL_PREFIX, NotificationConfig};

/// What happens to the remaining steps after set-commits fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitFailurePolicy {
    /// Stop the run; finalize and deploy are not attempted
    #[default]
    Abort,
    /// Finalize and record the deploy anyway, then report the failure
    Continue,
}

/// Per-run settings that would otherwise be process globals
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Directory sentry-cli runs in; relative artifact paths resolve against it
    pub working_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub default_url_prefix: String,
    pub commit_failure_policy: CommitFailurePolicy,
    pub dry_run: bool,
}

impl NotifierSettings {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        Self {
            credentials_path: working_dir.join(CREDENTIALS_FILE_NAME),
            working_dir,
            default_url_prefix: DEFAULT_SOURCE_MAP_URL_PREFIX.to_string(),
            commit_failure_policy: CommitFailurePolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_commit_failure_policy(mut self, policy: CommitFailurePolicy) -> Self {
        self.commit_failure_policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Everything a run needs, checked up front so no remote call starts with
/// incomplete settings.
#[derive(Debug, Clone)]
struct ReleasePlan {
    credentials: Credentials,
    version: String,
    environment: String,
    upload: Option<ArtifactUpload>,
    repository: Option<String>,
}

impl ReleasePlan {
    fn new(config: &NotificationConfig, host: &HostContext) -> Result<Self> {
        let credentials = config.validate()?;

        let version = host.commit_ref.clone().ok_or(NotifyError::ConfigError {
            setting: "release version",
            hint: "The commit reference is read from env variable COMMIT_REF",
        })?;

        let repository = if config.skip_commit_attachment {
            None
        } else {
            let url = host.repository_url.as_deref().ok_or(NotifyError::ConfigError {
                setting: "repository URL",
                hint: "Please set env variable REPOSITORY_URL or set skipSetCommits plugin input",
            })?;
            Some(repository_slug(url).ok_or(NotifyError::ConfigError {
                setting: "repository URL",
                hint: "REPOSITORY_URL must end with <owner>/<repo>",
            })?)
        };

        let upload = (!config.skip_artifact_upload).then(|| ArtifactUpload {
            path: config.artifact_path.clone(),
            url_prefix: config.artifact_url_prefix.clone(),
        });

        Ok(Self {
            credentials,
            version,
            environment: config.environment_name.clone(),
            upload,
            repository,
        })
    }

    fn skip_reason(&self, step: ReleaseStep) -> Option<&'static str> {
        match step {
            ReleaseStep::UploadArtifacts if self.upload.is_none() => Some("skipSourceMaps is set"),
            ReleaseStep::SetCommits if self.repository.is_none() => Some("skipSetCommits is set"),
            _ => None,
        }
    }
}

/// Notifies the release service that a build was deployed
pub struct Notifier<C> {
    client: C,
    settings: NotifierSettings,
}

impl<C: ReleaseClient> Notifier<C> {
    pub fn new(client: C, settings: NotifierSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Runs the whole notification.
    ///
    /// Returns `Ok(None)` for local builds, which never touch the network or
    /// the credentials file. In CI the credentials file exists for exactly the
    /// duration of the remote steps, whatever their outcome.
    pub async fn notify_deployment(
        &self,
        config: &NotificationConfig,
        host: &HostContext,
    ) -> Result<Option<ReleaseReport>> {
        if host.is_local {
            info!("Local build, skipping Sentry release notification");
            return Ok(None);
        }

        debug!("Resolved configuration: {:?}", config);
        let plan = ReleasePlan::new(config, host)?;

        if self.settings.dry_run {
            return Ok(Some(self.dry_run(&plan)));
        }

        let guard = write_credentials(&self.settings.credentials_path, &plan.credentials)?;
        let result = self.run_pipeline(&plan).await;
        // deletion failures are logged by the guard and never change the outcome
        let _ = guard.release();

        let report = result?;
        info!("Successfully notified Sentry of deployment!");
        Ok(Some(report))
    }

    fn dry_run(&self, plan: &ReleasePlan) -> ReleaseReport {
        let mut report = ReleaseReport::new(plan.version.clone(), plan.environment.clone());
        report.dry_run = true;

        for step in ReleaseStep::ALL {
            match plan.skip_reason(step) {
                Some(reason) => report.record(StepRecord::skipped(step, reason)),
                None => {
                    info!("[DRY_RUN] Would {} for release {}", step, plan.version);
                    report.record(StepRecord::skipped(step, "[DRY_RUN] Skipped"));
                }
            }
        }

        report.mark_completed();
        info!("[DRY_RUN] No credentials written and no Sentry calls made");
        report
    }

    async fn run_pipeline(&self, plan: &ReleasePlan) -> Result<ReleaseReport> {
        let mut report = ReleaseReport::new(plan.version.clone(), plan.environment.clone());
        let mut recovered: Option<NotifyError> = None;

        info!("Creating new release with version: {}", plan.version);

        for step in ReleaseStep::ALL {
            if let Some(reason) = plan.skip_reason(step) {
                info!("Skipping {}: {}", step, reason);
                report.record(StepRecord::skipped(step, reason));
                continue;
            }

            let started_at = Utc::now();
            match self.run_step(step, plan, &mut report).await {
                Ok(output) => {
                    report.record(StepRecord::finished(step, StepStatus::Success, started_at, output));
                }
                Err(message) => {
                    report.record(StepRecord::finished(
                        step,
                        StepStatus::Failed,
                        started_at,
                        message.clone(),
                    ));

                    if !step.is_recoverable() {
                        error!("Release {} failed to {}", plan.version, step);
                        return Err(NotifyError::RemoteError { phase: step, message });
                    }

                    warn!("Release {} failed to {}: {}", plan.version, step, message);
                    let err = NotifyError::CommitIntegrationError { message };
                    match self.settings.commit_failure_policy {
                        CommitFailurePolicy::Abort => return Err(err),
                        CommitFailurePolicy::Continue => recovered = Some(err),
                    }
                }
            }
        }

        report.mark_completed();
        match recovered {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    async fn run_step(
        &self,
        step: ReleaseStep,
        plan: &ReleasePlan,
        report: &mut ReleaseReport,
    ) -> std::result::Result<String, String> {
        let version = plan.version.as_str();
        match step {
            ReleaseStep::CreateRelease => self.client.new_release(version).await,
            ReleaseStep::UploadArtifacts => {
                let upload = plan.upload.as_ref().ok_or("no artifact upload configured")?;
                let root = self.settings.working_dir.join(&upload.path);
                let count = count_artifacts(&root).map_err(|e| {
                    format!("Cannot read artifact directory '{}': {}", root.display(), e)
                })?;
                if count == 0 {
                    warn!("No source maps or bundles found under {:?}", root);
                }
                info!("Uploading {} artifact(s) from {:?}", count, root);
                report.artifacts_uploaded = Some(count);
                self.client.upload_sourcemaps(version, upload).await
            }
            ReleaseStep::SetCommits => {
                let repository = plan.repository.as_deref().ok_or("no repository configured")?;
                self.client.set_commits(version, repository, version).await
            }
            ReleaseStep::Finalize => self.client.finalize(version).await,
            ReleaseStep::RecordDeploy => {
                info!("Recording deploy of {} to {}", version, plan.environment);
                self.client.new_deploy(version, &plan.environment).await
            }
        }
    }
}
