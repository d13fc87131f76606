use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use sentry_release_notifier::client::{DEFAULT_SENTRY_CLI, SentryCli};
use sentry_release_notifier::error::NotifyError;
use sentry_release_notifier::host::{EnvSource, HostContext, ProcessEnv, fail_build};
use sentry_release_notifier::logging::{FileLogger, setup_logging};
use sentry_release_notifier::notifier::{CommitFailurePolicy, Notifier, NotifierSettings};
use sentry_release_notifier::release::ReleaseReport;
use sentry_release_notifier::utils::parse_flag;
use sentry_release_notifier::{NotificationConfig, load_plugin_inputs};

const DEFAULT_PLUGIN_CONFIG: &str = "netlify.toml";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let env = ProcessEnv;
    let file_logger = env.var("SENTRY_NOTIFY_LOG_DIR").map(|d| FileLogger::new(PathBuf::from(d)));
    let _log_guard = setup_logging(file_logger.as_ref());

    match run(&env).await {
        Ok(Some(report)) if report.dry_run => {
            info!(
                "[DRY_RUN] Release {} would be deployed to {}",
                report.version, report.environment
            );
            ExitCode::SUCCESS
        }
        Ok(Some(report)) => {
            info!(
                "Release {} deployed to {} ({} artifact(s) uploaded)",
                report.version,
                report.environment,
                report
                    .artifacts_uploaded
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "no".to_string())
            );
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => fail_build(&e),
    }
}

async fn run(env: &ProcessEnv) -> Result<Option<ReleaseReport>, NotifyError> {
    let working_dir = std::env::current_dir()?;
    let config_path = env
        .var("SENTRY_PLUGIN_CONFIG")
        .unwrap_or_else(|| DEFAULT_PLUGIN_CONFIG.to_string());

    let inputs = load_plugin_inputs(working_dir.join(&config_path)).await?;
    let host = HostContext::from_env(env);

    let flag = |key: &str| env.var(key).as_deref().and_then(parse_flag).unwrap_or(false);
    let policy = if flag("SENTRY_CONTINUE_ON_COMMIT_FAILURE") {
        CommitFailurePolicy::Continue
    } else {
        CommitFailurePolicy::Abort
    };
    let settings = NotifierSettings::new(&working_dir)
        .with_commit_failure_policy(policy)
        .with_dry_run(flag("SENTRY_DRY_RUN"));

    let config = NotificationConfig::resolve(&inputs, env, &host, &settings.default_url_prefix);

    let cli_command = env
        .var("SENTRY_CLI")
        .unwrap_or_else(|| DEFAULT_SENTRY_CLI.to_string());
    let client = SentryCli::new(&cli_command, &working_dir);

    info!("Using plugin config at {:?}", config_path);
    let report = Notifier::new(client, settings)
        .notify_deployment(&config, &host)
        .await?;

    if let Some(report) = &report {
        debug!(
            "Release report:\n{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
    Ok(report)
}
