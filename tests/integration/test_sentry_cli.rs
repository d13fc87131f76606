//! sentry-cli invocations, checked against a fake CLI shell script

use crate::helpers::{REPOSITORY_URL, TestSite, VERSION, full_config};
use sentry_release_notifier::client::SentryCli;
use sentry_release_notifier::error::NotifyError;
use sentry_release_notifier::host::HostContext;
use sentry_release_notifier::notifier::{Notifier, NotifierSettings};
use std::path::{Path, PathBuf};

/// Writes a fake sentry-cli that appends its arguments to `calls.log`,
/// refuses to run without `.sentryclirc`, and fails on `fail_subcommand`.
fn fake_cli(site: &TestSite, fail_subcommand: &str) -> (String, PathBuf) {
    let log = site.path.join("calls.log");
    let script = site.path.join("fake-sentry-cli.sh");
    std::fs::write(
        &script,
        format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
if [ ! -f .sentryclirc ]; then
  echo "error: no auth token" >&2
  exit 1
fi
if [ "$2" = "{fail}" ]; then
  echo "error: API request failed" >&2
  exit 1
fi
echo "ok $2"
"#,
            log = log.display(),
            fail = fail_subcommand,
        ),
    )
    .unwrap();

    (format!("sh {}", script.display()), log)
}

fn read_calls(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_cli_arguments_for_full_release() {
    let site = TestSite::new();
    let (command, log) = fake_cli(&site, "none");
    let client = SentryCli::new(&command, &site.path);
    let notifier = Notifier::new(client, NotifierSettings::new(&site.path));

    let report = notifier
        .notify_deployment(&full_config(), &HostContext::ci(VERSION, REPOSITORY_URL))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        read_calls(&log),
        vec![
            "releases new abc123",
            "releases files abc123 upload-sourcemaps build --url-prefix ~/ --rewrite --ignore node_modules",
            "releases set-commits abc123 --commit acme/web@abc123",
            "releases finalize abc123",
            "releases deploys abc123 new -e production",
        ]
    );
    assert_eq!(report.steps[0].output.as_deref(), Some("ok new\n"));
    assert!(!site.credentials_path().exists());
}

#[tokio::test]
async fn test_cli_set_commits_failure_is_reported() {
    let site = TestSite::new();
    let (command, log) = fake_cli(&site, "set-commits");
    let client = SentryCli::new(&command, &site.path);
    let notifier = Notifier::new(client, NotifierSettings::new(&site.path));

    let err = notifier
        .notify_deployment(&full_config(), &HostContext::ci(VERSION, REPOSITORY_URL))
        .await
        .unwrap_err();

    match err {
        NotifyError::CommitIntegrationError { message } => {
            assert!(message.contains("API request failed"), "{message}");
        }
        other => panic!("expected commit integration error, got {other:?}"),
    }
    assert_eq!(read_calls(&log).len(), 3);
    assert!(!site.credentials_path().exists());
}

#[tokio::test]
async fn test_cli_without_credentials_fails() {
    let site = TestSite::new();
    let (command, _log) = fake_cli(&site, "none");
    let cli = SentryCli::new(&command, &site.path);

    let err = sentry_release_notifier::client::ReleaseClient::new_release(&cli, VERSION)
        .await
        .unwrap_err();
    assert!(err.contains("no auth token"), "{err}");
    assert!(err.contains("releases new abc123"), "{err}");
}
