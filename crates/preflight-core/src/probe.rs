//! HTTP GET capability used by the liveness and registry checks.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ProbeError, Result};

/// Status codes in `[200, 400)` count as "up" / "available".
pub fn is_available(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Issues a GET and reports the response status.
///
/// Network-level failures (DNS, refused connection, timeout) are returned as
/// [`ProbeError::Network`]; any response at all is `Ok(status)`.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get_status(&self, url: &str) -> std::result::Result<u16, ProbeError>;
}

/// GET `url` once and map the outcome onto the availability predicate.
pub async fn probe_once(probe: &dyn HttpProbe, url: &str) -> std::result::Result<u16, ProbeError> {
    let status = probe.get_status(url).await?;
    if is_available(status) {
        Ok(status)
    } else {
        Err(ProbeError::Status {
            url: url.to_string(),
            status,
        })
    }
}

/// [`HttpProbe`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    /// Build a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("preflight/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get_status(&self, url: &str) -> std::result::Result<u16, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(response.status().as_u16())
    }
}
