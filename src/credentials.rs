//! The `.sentryclirc` file sentry-cli reads its auth token and defaults from

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::NotifyError;
use crate::utils::fingerprint;

/// Name of the credentials file sentry-cli looks for in its working directory
pub const CREDENTIALS_FILE_NAME: &str = ".sentryclirc";

/// Validated settings needed to authenticate against Sentry
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub organization_slug: String,
    pub project_slug: String,
    pub auth_token: String,
}

impl Credentials {
    pub fn to_ini(&self) -> String {
        format!(
            "[auth]\ntoken={}\n[defaults]\nproject={}\norg={}\n",
            self.auth_token, self.project_slug, self.organization_slug
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("organization_slug", &self.organization_slug)
            .field("project_slug", &self.project_slug)
            .field("auth_token", &fingerprint(&self.auth_token))
            .finish()
    }
}

/// Writes the credentials file, replacing any existing one, and returns a
/// guard that removes it again.
pub fn write_credentials(path: &Path, credentials: &Credentials) -> Result<CredentialsGuard, NotifyError> {
    write_private(path, &credentials.to_ini()).map_err(|source| NotifyError::CredentialError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Wrote Sentry credentials for {}/{} to {:?}",
        credentials.organization_slug, credentials.project_slug, path
    );

    Ok(CredentialsGuard {
        path: Some(path.to_path_buf()),
    })
}

/// Writes `contents` readable by the owner only, truncating an existing file.
fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies on creation; a pre-existing file keeps its bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())
}

/// Removes the credentials file. A file that is already gone is fine.
pub fn delete_credentials(path: &Path) -> Result<(), NotifyError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed credentials file {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(NotifyError::CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Owns a written credentials file; the file is deleted on `release` or drop.
#[derive(Debug)]
#[must_use = "dropping the guard deletes the credentials file"]
pub struct CredentialsGuard {
    path: Option<PathBuf>,
}

impl CredentialsGuard {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Deletes the file now. Failures are logged and returned, never panicking.
    pub fn release(mut self) -> Result<(), NotifyError> {
        match self.path.take() {
            Some(path) => cleanup(&path),
            None => Ok(()),
        }
    }
}

impl Drop for CredentialsGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = cleanup(&path);
        }
    }
}

fn cleanup(path: &Path) -> Result<(), NotifyError> {
    delete_credentials(path).inspect_err(|e| {
        error!("{}. The Sentry auth token may still be on disk.", e);
    })
}
