//! Preflight configuration.
//!
//! Layering, lowest precedence first: built-in defaults, an optional JSON
//! config file, `PREFLIGHT_*` environment variables, then CLI flags (applied
//! by the binary).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PreflightError, Result};
use crate::liveness::LivenessChecker;
use crate::probe::{HttpProbe, ReqwestProbe};
use crate::registry::{RegistryAvailabilityChecker, DEFAULT_REGISTRY_URL};
use crate::retry::{RetryPolicy, RetrySettings};
use crate::test_run::{ProcessRunner, TestRunInvoker, TestRunnerConfig};

pub const ENV_REGISTRY_URL: &str = "PREFLIGHT_REGISTRY_URL";
pub const ENV_INTERNAL_SCOPE: &str = "PREFLIGHT_INTERNAL_SCOPE";
pub const ENV_APP_PREFIX: &str = "PREFLIGHT_APP_PREFIX";

/// Everything the checks need beyond per-invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Registry base URL for per-version package lookups.
    pub registry_url: String,
    /// Dependencies whose names start with this prefix are verified.
    pub internal_scope: String,
    /// First component of generated app names.
    pub app_name_prefix: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    pub liveness: RetrySettings,
    pub registry: RetrySettings,
    pub test_runner: TestRunnerConfig,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            internal_scope: "@remix-run".to_string(),
            app_name_prefix: "remix".to_string(),
            request_timeout_secs: 30,
            liveness: RetryPolicy::LIVENESS.into(),
            registry: RetryPolicy::REGISTRY.into(),
            test_runner: TestRunnerConfig::default(),
        }
    }
}

impl PreflightConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| PreflightError::Config(format!("{}: {e}", path.display())))
    }

    /// Optional config file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// Apply `PREFLIGHT_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_REGISTRY_URL) {
            self.registry_url = url;
        }
        if let Some(scope) = lookup(ENV_INTERNAL_SCOPE) {
            self.internal_scope = scope;
        }
        if let Some(prefix) = lookup(ENV_APP_PREFIX) {
            self.app_name_prefix = prefix;
        }
        self
    }

    pub fn liveness_policy(&self) -> Result<RetryPolicy> {
        self.liveness.to_policy()
    }

    pub fn registry_policy(&self) -> Result<RetryPolicy> {
        self.registry.to_policy()
    }

    /// reqwest-backed probe honouring `request_timeout_secs`.
    pub fn http_probe(&self) -> Result<Arc<dyn HttpProbe>> {
        if self.request_timeout_secs == 0 {
            return Err(PreflightError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        let probe = ReqwestProbe::new(Duration::from_secs(self.request_timeout_secs))?;
        Ok(Arc::new(probe))
    }

    pub fn liveness_checker(&self, probe: Arc<dyn HttpProbe>) -> Result<LivenessChecker> {
        Ok(LivenessChecker::new(probe).with_policy(self.liveness_policy()?))
    }

    pub fn registry_checker(&self, probe: Arc<dyn HttpProbe>) -> Result<RegistryAvailabilityChecker> {
        Ok(
            RegistryAvailabilityChecker::new(probe, &self.registry_url, &self.internal_scope)
                .with_policy(self.registry_policy()?),
        )
    }

    pub fn test_invoker(&self, runner: Arc<dyn ProcessRunner>) -> TestRunInvoker {
        TestRunInvoker::new(runner).with_config(self.test_runner.clone())
    }
}
