//! Bounded retry with a constant delay.
//!
//! [`retry`] drives a fallible async operation until it succeeds or the
//! [`RetryPolicy`] budget is spent. The wait between attempts is a
//! `tokio::time::sleep`, so concurrent probes keep making progress while one
//! of them is backing off.
//!
//! There is no jitter and no exponential growth: CI polling windows are
//! short and the delay is the same before every attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PreflightError, Result};

/// Delay and attempt budget for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Server liveness: 10 attempts, 10 seconds apart.
    pub const LIVENESS: RetryPolicy = RetryPolicy {
        delay: Duration::from_secs(10),
        max_attempts: 10,
    };

    /// Per-package registry lookup: 4 attempts, 5 seconds apart.
    pub const REGISTRY: RetryPolicy = RetryPolicy {
        delay: Duration::from_secs(5),
        max_attempts: 4,
    };

    /// Build a policy. `max_attempts` must be at least 1.
    pub fn new(delay: Duration, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(PreflightError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            delay,
            max_attempts,
        })
    }

    /// Build a policy from a delay in milliseconds.
    pub fn from_millis(delay_ms: u64, max_attempts: u32) -> Result<Self> {
        Self::new(Duration::from_millis(delay_ms), max_attempts)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on time spent waiting between attempts.
    pub fn patience(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

/// Serializable form of a [`RetryPolicy`], as it appears in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub delay_ms: u64,
    pub max_attempts: u32,
}

impl RetrySettings {
    pub fn to_policy(self) -> Result<RetryPolicy> {
        RetryPolicy::from_millis(self.delay_ms, self.max_attempts)
    }
}

impl From<RetryPolicy> for RetrySettings {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            delay_ms: policy.delay.as_millis() as u64,
            max_attempts: policy.max_attempts,
        }
    }
}

/// Terminal failure of a retry sequence: the error from the final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryExhausted<E> {}

/// Run `operation` until it succeeds or `policy.max_attempts()` attempts
/// have failed.
///
/// Sleeps `policy.delay()` between attempts, never after the last one.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> std::result::Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
