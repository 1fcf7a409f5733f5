//! Polls a deployed app until its HTTP server answers.

use std::sync::Arc;

use tracing::info;

use crate::error::{PreflightError, Result};
use crate::obs;
use crate::probe::{probe_once, HttpProbe};
use crate::retry::{retry, RetryPolicy};

/// Confirms a single URL responds with a 2xx/3xx status.
#[derive(Clone)]
pub struct LivenessChecker {
    probe: Arc<dyn HttpProbe>,
    policy: RetryPolicy,
}

impl LivenessChecker {
    pub fn new(probe: Arc<dyn HttpProbe>) -> Self {
        Self {
            probe,
            policy: RetryPolicy::LIVENESS,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll `url` until it is up or the retry budget runs out.
    ///
    /// Fails with [`PreflightError::LivenessTimeout`] carrying the last
    /// observed status or network error.
    pub async fn check_up(&self, url: &str) -> Result<()> {
        let mut attempt = 0u32;
        let outcome = retry(&self.policy, move || {
            attempt += 1;
            let current = attempt;
            async move {
                probe_once(self.probe.as_ref(), url).await.map_err(|e| {
                    obs::emit_probe_attempt_failed(url, current, &e);
                    e
                })
            }
        })
        .await;

        match outcome {
            Ok(status) => {
                info!(url = %url, status, "app server is up");
                Ok(())
            }
            Err(exhausted) => Err(PreflightError::LivenessTimeout {
                url: url.to_string(),
                attempts: exhausted.attempts,
                last_error: exhausted.last_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::fakes::{ScriptedProbe, ScriptedResponse};
    use std::time::Duration;

    const APP: &str = "http://localhost:3000/";

    #[test]
    fn default_policy_is_ten_by_ten_seconds() {
        let policy = LivenessChecker::new(Arc::new(ScriptedProbe::new())).policy;
        assert_eq!(policy.delay(), Duration::from_secs(10));
        assert_eq!(policy.max_attempts(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn up_on_first_call() {
        let probe = Arc::new(ScriptedProbe::new().route(APP, [200]));
        let checker = LivenessChecker::new(probe.clone());

        checker.check_up(APP).await.expect("server is up");
        assert_eq!(probe.call_count(APP), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn comes_up_after_connection_refused() {
        let probe = Arc::new(ScriptedProbe::new().route(
            APP,
            [
                ScriptedResponse::Network("connection refused".to_string()),
                ScriptedResponse::Network("connection refused".to_string()),
                ScriptedResponse::Status(200),
            ],
        ));
        let checker = LivenessChecker::new(probe.clone());

        checker.check_up(APP).await.expect("server came up");
        assert_eq!(probe.call_count(APP), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn always_503_times_out_after_ten_spaced_attempts() {
        let probe = Arc::new(ScriptedProbe::new().route(APP, [503]));
        let checker = LivenessChecker::new(probe.clone());

        let err = checker.check_up(APP).await.unwrap_err();
        match err {
            PreflightError::LivenessTimeout {
                url,
                attempts,
                last_error,
            } => {
                assert_eq!(url, APP);
                assert_eq!(attempts, 10);
                assert_eq!(
                    last_error,
                    ProbeError::Status {
                        url: APP.to_string(),
                        status: 503
                    }
                );
            }
            other => panic!("expected LivenessTimeout, got {other:?}"),
        }

        let times = probe.call_times(APP);
        assert_eq!(times.len(), 10);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(10_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_is_respected() {
        let probe = Arc::new(ScriptedProbe::new().route(APP, [500]));
        let checker =
            LivenessChecker::new(probe.clone()).with_policy(RetryPolicy::from_millis(50, 2).unwrap());

        assert!(checker.check_up(APP).await.is_err());
        assert_eq!(probe.call_count(APP), 2);
    }
}
