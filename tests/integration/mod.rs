//! Integration tests for sentry_release_notifier

mod helpers;
#[cfg(unix)]
mod test_sentry_cli;
