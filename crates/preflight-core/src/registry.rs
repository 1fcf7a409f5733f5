//! Registry availability checks for internal package dependencies.
//!
//! Every dependency whose name starts with the internal scope is looked up
//! on the registry's per-version endpoint (`{registry}/{name}/{version}`).
//! Lookups run concurrently on the calling task, each with its own retry
//! budget. All lookups run to completion and every failure is reported.

use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AvailabilityError, PreflightError, Result};
use crate::obs;
use crate::probe::{probe_once, HttpProbe};
use crate::retry::{retry, RetryPolicy};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// A declared dependency: package name and the version range it asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    pub version_range: String,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, version_range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_range: version_range.into(),
        }
    }
}

fn coerce_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^\d])(\d{1,16})(?:\.(\d{1,16}))?(?:\.(\d{1,16}))?(?:$|[^\d])")
            .expect("coerce pattern is valid")
    })
}

/// Coerce a version range to the concrete version it names.
///
/// Takes the first run of up to three dot-separated numbers and zero-fills
/// the rest: `^1.2.3` -> `1.2.3`, `~2.1` -> `2.1.0`, `>=3` -> `3.0.0`.
/// Pre-release and build suffixes are dropped. Returns `None` when the range
/// has no numeric component (`*`, `latest`, `workspace:*`).
pub fn coerce_version(range: &str) -> Option<semver::Version> {
    let caps = coerce_pattern().captures(range)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(semver::Version::new(part(1)?, part(2)?, part(3)?))
}

/// Confirms internal dependencies are published on the registry.
#[derive(Clone)]
pub struct RegistryAvailabilityChecker {
    probe: Arc<dyn HttpProbe>,
    registry_url: String,
    internal_scope: String,
    policy: RetryPolicy,
}

impl RegistryAvailabilityChecker {
    pub fn new(
        probe: Arc<dyn HttpProbe>,
        registry_url: impl Into<String>,
        internal_scope: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
            internal_scope: internal_scope.into(),
            policy: RetryPolicy::REGISTRY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn internal_scope(&self) -> &str {
        &self.internal_scope
    }

    /// Whether `name` belongs to the internal namespace.
    pub fn is_internal(&self, name: &str) -> bool {
        name.starts_with(&self.internal_scope)
    }

    /// Per-version lookup URL for a package.
    pub fn package_url(&self, name: &str, version: &semver::Version) -> String {
        format!("{}/{}/{}", self.registry_url, name, version)
    }

    /// Check every internal dependency in `deps`.
    ///
    /// Returns how many dependencies were checked. Fails with
    /// [`PreflightError::Availability`] listing every dependency that could
    /// not be confirmed, in declaration order.
    pub async fn validate_package_versions(&self, deps: &[DependencySpec]) -> Result<usize> {
        let internal: Vec<&DependencySpec> = deps
            .iter()
            .filter(|dep| {
                let keep = self.is_internal(&dep.name);
                if !keep {
                    debug!(package = %dep.name, "skipping third-party dependency");
                }
                keep
            })
            .collect();

        let outcomes = join_all(internal.iter().map(|dep| self.verify_package(dep))).await;

        let failures: Vec<AvailabilityError> = outcomes.into_iter().filter_map(|r| r.err()).collect();
        if failures.is_empty() {
            Ok(internal.len())
        } else {
            Err(PreflightError::Availability(failures))
        }
    }

    async fn verify_package(&self, dep: &DependencySpec) -> std::result::Result<(), AvailabilityError> {
        let Some(version) = coerce_version(&dep.version_range) else {
            return Err(AvailabilityError::UnresolvableVersion {
                name: dep.name.clone(),
                range: dep.version_range.clone(),
            });
        };
        let url = self.package_url(&dep.name, &version);

        let mut attempt = 0u32;
        let url_ref = url.as_str();
        let outcome = retry(&self.policy, move || {
            attempt += 1;
            let current = attempt;
            async move {
                probe_once(self.probe.as_ref(), url_ref).await.map_err(|e| {
                    obs::emit_probe_attempt_failed(url_ref, current, &e);
                    e
                })
            }
        })
        .await;

        match outcome {
            Ok(_) => {
                info!(package = %dep.name, version = %version, "package is available");
                Ok(())
            }
            Err(exhausted) => Err(AvailabilityError::Unavailable {
                name: dep.name.clone(),
                version: version.to_string(),
                attempts: exhausted.attempts,
                last_error: exhausted.last_error,
            }),
        }
    }
}
