//! Unique names for generated apps.

use std::path::Path;
use std::process::Command;

use crate::error::{PreflightError, Result};

/// Capture the HEAD commit SHA of the repository containing `repo_dir`.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| PreflightError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PreflightError::Git(format!(
            "git rev-parse HEAD failed: {}",
            stderr.trim()
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(PreflightError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// `<prefix>-<target>-<sha7>-<hex4>`, e.g. `remix-vercel-1a2b3c4-9f0e`.
pub fn format_app_name(prefix: &str, target: &str, sha: &str, unique: &str) -> String {
    let short: String = sha.chars().take(7).collect();
    format!("{prefix}-{target}-{short}-{unique}")
}

/// Four random lowercase hex characters.
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_string()
}

/// Generate a unique app name for a deployment `target`, tagged with the
/// current commit of `repo_dir`.
pub fn app_name(prefix: &str, target: &str, repo_dir: &Path) -> Result<String> {
    let sha = capture_head_sha(repo_dir)?;
    Ok(format_app_name(prefix, target, &sha, &unique_suffix()))
}
