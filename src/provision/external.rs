//! Pre-existing database
//!
//! Nothing is started or stopped; the reset still empties its tables, so
//! point it only at a database reserved for tests.

use crate::config::{ConnectionConfig, FixtureSettings};
use crate::error::{ProvisionResult, ProvisioningError};
use crate::provision::Provisioner;
use async_trait::async_trait;
use std::time::Duration;

pub struct ExternalProvisioner {
    url: String,
}

impl ExternalProvisioner {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Provisioner for ExternalProvisioner {
    async fn start(
        &mut self,
        _settings: &FixtureSettings,
        _timeout: Duration,
    ) -> ProvisionResult<ConnectionConfig> {
        let config = ConnectionConfig::from_url(&self.url)
            .map_err(|e| ProvisioningError::Config(e.to_string()))?;
        tracing::info!(url = %config.url(), "using external PostgreSQL instance");
        Ok(config)
    }

    async fn stop(&mut self) -> ProvisionResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        match ConnectionConfig::from_url(&self.url) {
            Ok(config) => format!("external {}", config.url()),
            Err(_) => "external (invalid url)".to_string(),
        }
    }
}
