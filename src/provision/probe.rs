//! Readiness probe
//!
//! A container reporting "started" is not the same as a server accepting
//! queries: the postgres entrypoint restarts the server once after initdb.
//! The probe connects and runs `SELECT 1` until that works or the deadline
//! passes.

use crate::config::ConnectionConfig;
use crate::db::PostgresExecutor;
use crate::error::{ProvisionResult, ProvisioningError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Decides when a freshly started instance is usable
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Wait until `config` is usable, returning the number of attempts
    ///
    /// `started` is when provisioning began; timeouts report time since then.
    ///
    /// # Errors
    /// Returns `ProvisioningError::Timeout` once `deadline` passes
    async fn wait(
        &self,
        config: &ConnectionConfig,
        started: Instant,
        deadline: Instant,
        interval: Duration,
    ) -> ProvisionResult<u32>;
}

/// Connect-and-`SELECT 1` probe
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryProbe;

#[async_trait]
impl ReadinessProbe for QueryProbe {
    async fn wait(
        &self,
        config: &ConnectionConfig,
        started: Instant,
        deadline: Instant,
        interval: Duration,
    ) -> ProvisionResult<u32> {
        wait_until_ready(config, started, deadline, interval).await
    }
}

/// Poll `config` every `interval` until it answers or `deadline` passes
///
/// Returns the number of attempts it took. A timeout reports the time
/// elapsed since `started`.
pub async fn wait_until_ready(
    config: &ConnectionConfig,
    started: Instant,
    deadline: Instant,
    interval: Duration,
) -> ProvisionResult<u32> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        let last_error = if remaining.is_zero() {
            "deadline passed before first attempt".to_string()
        } else {
            match PostgresExecutor::connect_within(config, remaining).await {
                Ok(executor) => match executor.ping().await {
                    Ok(()) => {
                        tracing::debug!(attempts, elapsed = ?start.elapsed(), "database is ready");
                        return Ok(attempts);
                    }
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            }
        };

        if Instant::now() + interval >= deadline {
            return Err(ProvisioningError::Timeout {
                waited: started.elapsed(),
                last_error,
            });
        }

        tracing::debug!(attempt = attempts, error = %last_error, "database not ready yet");
        tokio::time::sleep(interval).await;
    }
}
