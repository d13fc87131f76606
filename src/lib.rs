pub mod client;
pub mod credentials;
pub mod error;
pub mod host;
pub mod logging;
pub mod notifier;
pub mod release;
pub mod utils;

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::error::NotifyError;
use crate::host::{EnvSource, HostContext};
use crate::utils::{fingerprint, parse_flag};

pub const DEFAULT_SOURCE_MAP_URL_PREFIX: &str = "~/";
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Top level of the plugin configuration file (`netlify.toml` layout)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginConfigFile {
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PluginEntry {
    pub package: String,
    #[serde(default)]
    pub inputs: PluginInputs,
}

/// Inputs the user configured for the plugin
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginInputs {
    pub sentry_org: Option<String>,
    pub sentry_project: Option<String>,
    #[serde(alias = "sentryAuthenticationToken")]
    pub sentry_auth_token: Option<String>,
    pub sentry_environment: Option<String>,
    pub source_map_path: Option<String>,
    pub source_map_url_prefix: Option<String>,
    pub skip_set_commits: Option<bool>,
    pub skip_source_maps: Option<bool>,
}

impl PluginConfigFile {
    /// Returns the inputs of the first plugin entry whose package mentions sentry.
    pub fn sentry_inputs(&self) -> PluginInputs {
        self.plugins
            .iter()
            .find(|p| p.package.contains("sentry"))
            .map(|p| p.inputs.clone())
            .unwrap_or_default()
    }
}

/// Load the plugin inputs from the host configuration file.
/// A missing file means no inputs were configured.
pub async fn load_plugin_inputs(path: impl AsRef<Path>) -> Result<PluginInputs, NotifyError> {
    let path = path.as_ref();
    let config_str = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No plugin config at {:?}, using environment only", path);
            return Ok(PluginInputs::default());
        }
        Err(e) => {
            return Err(NotifyError::InputFileError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let file: PluginConfigFile = toml::from_str(&config_str).map_err(|e| {
        NotifyError::InputFileError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    info!("Loaded plugin inputs from {:?}", path);
    Ok(file.sentry_inputs())
}

/// Fully resolved settings for one notification run
#[derive(Clone, PartialEq)]
pub struct NotificationConfig {
    pub organization_slug: Option<String>,
    pub project_slug: Option<String>,
    pub auth_token: Option<String>,
    pub environment_name: String,
    pub artifact_path: String,
    pub artifact_url_prefix: String,
    pub skip_commit_attachment: bool,
    pub skip_artifact_upload: bool,
}

impl NotificationConfig {
    /// Resolves every setting with the precedence: environment variable,
    /// then plugin input, then host value or built-in default.
    ///
    /// | setting | env | input | fallback |
    /// |---|---|---|---|
    /// | org | `SENTRY_ORG` | `sentryOrg` | - |
    /// | project | `SENTRY_PROJECT` | `sentryProject` | - |
    /// | token | `SENTRY_AUTH_TOKEN` | `sentryAuthToken` | - |
    /// | environment | `SENTRY_ENVIRONMENT` | `sentryEnvironment` | `CONTEXT`, `production` |
    /// | artifact path | `SENTRY_SOURCE_MAP_PATH` | `sourceMapPath` | `PUBLISH_DIR`, `.` |
    /// | url prefix | `SENTRY_SOURCE_MAP_URL_PREFIX` | `sourceMapUrlPrefix` | `default_url_prefix` |
    /// | skip upload | `SENTRY_SKIP_SOURCE_MAPS` | `skipSourceMaps` | false |
    /// | skip commits | `SENTRY_SKIP_SET_COMMITS` | `skipSetCommits` | false |
    pub fn resolve(
        inputs: &PluginInputs,
        env: &impl EnvSource,
        host: &HostContext,
        default_url_prefix: &str,
    ) -> Self {
        let pick = |key: &str, input: &Option<String>| {
            env.var(key)
                .or_else(|| input.clone().filter(|v| !v.is_empty()))
        };
        let flag = |key: &str, input: Option<bool>| {
            env.var(key)
                .as_deref()
                .and_then(parse_flag)
                .or(input)
                .unwrap_or(false)
        };

        Self {
            organization_slug: pick("SENTRY_ORG", &inputs.sentry_org),
            project_slug: pick("SENTRY_PROJECT", &inputs.sentry_project),
            auth_token: pick("SENTRY_AUTH_TOKEN", &inputs.sentry_auth_token),
            environment_name: pick("SENTRY_ENVIRONMENT", &inputs.sentry_environment)
                .or_else(|| host.deploy_context.clone())
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            artifact_path: pick("SENTRY_SOURCE_MAP_PATH", &inputs.source_map_path)
                .or_else(|| host.publish_dir.clone())
                .unwrap_or_else(|| ".".to_string()),
            artifact_url_prefix: pick("SENTRY_SOURCE_MAP_URL_PREFIX", &inputs.source_map_url_prefix)
                .unwrap_or_else(|| default_url_prefix.to_string()),
            skip_commit_attachment: flag("SENTRY_SKIP_SET_COMMITS", inputs.skip_set_commits),
            skip_artifact_upload: flag("SENTRY_SKIP_SOURCE_MAPS", inputs.skip_source_maps),
        }
    }

    /// Checks the three required settings, in the order the build reports
    /// them, and returns the credentials for the run.
    pub fn validate(&self) -> Result<Credentials, NotifyError> {
        let auth_token = self.auth_token.clone().ok_or(NotifyError::ConfigError {
            setting: "authentication token",
            hint: "Please set env variable SENTRY_AUTH_TOKEN or set sentryAuthToken plugin input",
        })?;
        let organization_slug = self.organization_slug.clone().ok_or(NotifyError::ConfigError {
            setting: "organization slug",
            hint: "Please set env variable SENTRY_ORG or set sentryOrg plugin input",
        })?;
        let project_slug = self.project_slug.clone().ok_or(NotifyError::ConfigError {
            setting: "project slug",
            hint: "Please set env variable SENTRY_PROJECT or set sentryProject plugin input",
        })?;

        Ok(Credentials {
            organization_slug,
            project_slug,
            auth_token,
        })
    }
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("organization_slug", &self.organization_slug)
            .field("project_slug", &self.project_slug)
            .field("auth_token", &self.auth_token.as_deref().map(fingerprint))
            .field("environment_name", &self.environment_name)
            .field("artifact_path", &self.artifact_path)
            .field("artifact_url_prefix", &self.artifact_url_prefix)
            .field("skip_commit_attachment", &self.skip_commit_attachment)
            .field("skip_artifact_upload", &self.skip_artifact_upload)
            .finish()
    }
}
