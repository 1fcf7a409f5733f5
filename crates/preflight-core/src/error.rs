//! Error taxonomy for preflight checks.
//!
//! Transient probe failures ([`ProbeError`]) are retried locally and never
//! surface on their own. Budget exhaustion and test-run failures are the
//! pipeline-fatal variants of [`PreflightError`].

use std::path::PathBuf;

use crate::test_run::RunMode;

/// A single failed probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {message}")]
    Network { url: String, message: String },
}

/// A dependency that could not be confirmed on the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("package {name}@{range} has no resolvable version")]
    UnresolvableVersion { name: String, range: String },

    #[error("package {name}@{version} is not available after {attempts} attempt(s): {last_error}")]
    Unavailable {
        name: String,
        version: String,
        attempts: u32,
        last_error: ProbeError,
    },
}

impl AvailabilityError {
    /// Package name this failure refers to.
    pub fn package_name(&self) -> &str {
        match self {
            AvailabilityError::UnresolvableVersion { name, .. } => name,
            AvailabilityError::Unavailable { name, .. } => name,
        }
    }
}

/// Preflight errors.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("app server at {url} is not up after {attempts} attempt(s): {last_error}")]
    LivenessTimeout {
        url: String,
        attempts: u32,
        last_error: ProbeError,
    },

    #[error("{} package(s) unavailable: {}", .0.len(), join_errors(.0))]
    Availability(Vec<AvailabilityError>),

    #[error("end-to-end tests failed in {mode} (exit code: {})", exit_code_label(.exit_code))]
    TestRunFailure { mode: RunMode, exit_code: Option<i32> },

    #[error("failed to spawn test runner `{program}`: {source}")]
    TestRunnerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest error in {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreflightError {
    /// Whether this error halts the pipeline at one of its gates
    /// (as opposed to a setup or I/O problem).
    pub fn is_gate_failure(&self) -> bool {
        matches!(
            self,
            PreflightError::LivenessTimeout { .. }
                | PreflightError::Availability(_)
                | PreflightError::TestRunFailure { .. }
        )
    }
}

impl From<reqwest::Error> for PreflightError {
    fn from(err: reqwest::Error) -> Self {
        PreflightError::Http(err.to_string())
    }
}

fn join_errors(errors: &[AvailabilityError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Result type for preflight operations.
pub type Result<T> = std::result::Result<T, PreflightError>;
