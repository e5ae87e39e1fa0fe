//! Docker client wrapper
//!
//! Wraps the bollard client so the rest of the crate talks to one type and
//! connection failures are mapped to actionable `DockerError` variants.

use super::DockerError;
use bollard::Docker;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::debug;

/// Seconds bollard waits on a single request before giving up
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Number of ping attempts before the daemon is reported unreachable
const PING_RETRIES: usize = 3;

/// Thin wrapper around a connected bollard client
#[derive(Debug, Clone)]
pub struct DockerClient {
    inner: Docker,
}

impl DockerClient {
    /// Connect to the local daemon (DOCKER_HOST or the platform socket)
    pub fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(DockerError::from)?
            .with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        Ok(Self { inner: docker })
    }

    /// Connect and verify the daemon answers
    pub async fn connect() -> Result<Self, DockerError> {
        let client = Self::new()?;
        client.verify_connection().await?;
        Ok(client)
    }

    /// Ping the daemon, retrying briefly with backoff
    pub async fn verify_connection(&self) -> Result<(), DockerError> {
        let strategy = ExponentialBackoff::from_millis(200)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(PING_RETRIES - 1);

        Retry::spawn(strategy, || async {
            debug!("Pinging Docker daemon");
            self.inner.ping().await.map_err(DockerError::from)
        })
        .await?;

        debug!("Docker daemon reachable");
        Ok(())
    }

    /// Access the underlying bollard client
    pub fn inner(&self) -> &Docker {
        &self.inner
    }
}
