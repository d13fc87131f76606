use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// File extensions sentry-cli picks up when uploading source maps
pub const ARTIFACT_EXTENSIONS: &[&str] = &["js", "map", "jsbundle", "bundle"];

/// Directory name excluded from artifact uploads
pub const IGNORED_DIR: &str = "node_modules";

/// Derives the `owner/repo` identifier from a repository URL by taking the
/// last two path segments. A trailing slash or `.git` suffix is ignored.
pub fn repository_slug(repository_url: &str) -> Option<String> {
    let trimmed = repository_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    // scp-like git remotes: git@github.com:owner/repo
    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest,
        None => trimmed.rsplit_once(':').map(|(_, p)| p).unwrap_or(trimmed),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }
    Some(segments[segments.len() - 2..].join("/"))
}

/// Counts the files under `root` that would be uploaded as artifacts.
pub fn count_artifacts(root: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if entry.file_name() == IGNORED_DIR {
                continue;
            }
            count += count_artifacts(&path)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext))
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Short, non-reversible fingerprint of a secret for log output
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("sha256:{}", &hex::encode(digest)[..12])
}

/// Parses a boolean flag the way build hosts write them.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
