//! Test helpers for integration tests

use async_trait::async_trait;
use sentry_release_notifier::NotificationConfig;
use sentry_release_notifier::client::{ArtifactUpload, ReleaseClient};
use sentry_release_notifier::credentials::CREDENTIALS_FILE_NAME;
use sentry_release_notifier::release::ReleaseStep;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const VERSION: &str = "abc123";
pub const REPOSITORY_URL: &str = "https://github.com/acme/web";

/// A build directory with a few bundles and source maps
pub struct TestSite {
    _root: TempDir,
    pub path: PathBuf,
}

impl TestSite {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let path = root.path().to_path_buf();

        std::fs::create_dir_all(path.join("build/static/js")).unwrap();
        std::fs::create_dir_all(path.join("node_modules/react")).unwrap();
        std::fs::write(path.join("build/index.html"), "<html></html>").unwrap();
        std::fs::write(path.join("build/static/js/main.js"), "console.log(1)\n//# sourceMappingURL=main.js.map").unwrap();
        std::fs::write(path.join("build/static/js/main.js.map"), "{}").unwrap();
        std::fs::write(path.join("node_modules/react/index.js"), "").unwrap();

        Self { _root: root, path }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.path.join(CREDENTIALS_FILE_NAME)
    }
}

/// Complete configuration pointing at the test site's `build` directory
pub fn full_config() -> NotificationConfig {
    NotificationConfig {
        organization_slug: Some("acme".into()),
        project_slug: Some("web".into()),
        auth_token: Some("t123".into()),
        environment_name: "production".into(),
        artifact_path: "build".into(),
        artifact_url_prefix: "~/".into(),
        skip_commit_attachment: false,
        skip_artifact_upload: false,
    }
}

/// Release client that records calls and whether credentials existed at each
pub struct RecordingClient {
    credentials_path: PathBuf,
    fail_on: Option<ReleaseStep>,
    block_cleanup: bool,
    calls: Mutex<Vec<ReleaseStep>>,
    credentials_seen: Mutex<Vec<bool>>,
    commits: Mutex<Vec<(String, String)>>,
    deploys: Mutex<Vec<String>>,
}

impl RecordingClient {
    pub fn new(credentials_path: &Path) -> Self {
        Self {
            credentials_path: credentials_path.to_path_buf(),
            fail_on: None,
            block_cleanup: false,
            calls: Mutex::new(Vec::new()),
            credentials_seen: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            deploys: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, step: ReleaseStep) -> Self {
        self.fail_on = Some(step);
        self
    }

    /// Replaces the credentials file with a non-empty directory while the
    /// deploy is recorded, so deleting it afterwards fails.
    pub fn blocking_cleanup(mut self) -> Self {
        self.block_cleanup = true;
        self
    }

    pub fn calls(&self) -> Vec<ReleaseStep> {
        self.calls.lock().unwrap().clone()
    }

    pub fn credentials_seen(&self) -> Vec<bool> {
        self.credentials_seen.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<(String, String)> {
        self.commits.lock().unwrap().clone()
    }

    pub fn deploys(&self) -> Vec<String> {
        self.deploys.lock().unwrap().clone()
    }

    fn record(&self, step: ReleaseStep) -> Result<String, String> {
        self.calls.lock().unwrap().push(step);
        self.credentials_seen
            .lock()
            .unwrap()
            .push(self.credentials_path.exists());

        if self.fail_on == Some(step) {
            Err(format!("error: API request failed during {}", step))
        } else {
            Ok(format!("{} ok", step))
        }
    }
}

#[async_trait]
impl ReleaseClient for RecordingClient {
    async fn new_release(&self, _version: &str) -> Result<String, String> {
        self.record(ReleaseStep::CreateRelease)
    }

    async fn upload_sourcemaps(&self, _version: &str, _upload: &ArtifactUpload) -> Result<String, String> {
        self.record(ReleaseStep::UploadArtifacts)
    }

    async fn set_commits(&self, _version: &str, repository: &str, commit: &str) -> Result<String, String> {
        self.commits
            .lock()
            .unwrap()
            .push((repository.to_string(), commit.to_string()));
        self.record(ReleaseStep::SetCommits)
    }

    async fn finalize(&self, _version: &str) -> Result<String, String> {
        self.record(ReleaseStep::Finalize)
    }

    async fn new_deploy(&self, _version: &str, environment: &str) -> Result<String, String> {
        self.deploys.lock().unwrap().push(environment.to_string());
        let result = self.record(ReleaseStep::RecordDeploy);
        if self.block_cleanup {
            std::fs::remove_file(&self.credentials_path).unwrap();
            std::fs::create_dir(&self.credentials_path).unwrap();
            std::fs::write(self.credentials_path.join("keep"), "").unwrap();
        }
        result
    }
}

/// In-memory log sink for asserting on emitted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes this thread's tracing output into a buffer until the guard drops
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
