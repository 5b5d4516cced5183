//! Instance provisioning
//!
//! A [`Provisioner`] brings a PostgreSQL instance up and reports where it
//! listens; the fixture then probes it until it answers queries.
//!
//! - [`ContainerProvisioner`] runs the official `postgres` image through
//!   testcontainers
//! - [`ExternalProvisioner`] uses a database that already exists, e.g. a CI
//!   service container

pub mod container;
pub mod external;
pub mod probe;

pub use container::ContainerProvisioner;
pub use external::ExternalProvisioner;
pub use probe::{QueryProbe, ReadinessProbe};

use crate::config::{ConnectionConfig, FixtureSettings};
use crate::error::ProvisionResult;
use async_trait::async_trait;
use std::time::Duration;

/// Starts and stops one database instance
#[async_trait]
pub trait Provisioner: Send {
    /// Start the instance and return its endpoint
    ///
    /// Implementations give up after `timeout` and release anything they
    /// started before returning an error.
    ///
    /// # Errors
    /// Returns `ProvisioningError::Start` or `ProvisioningError::Endpoint`
    async fn start(
        &mut self,
        settings: &FixtureSettings,
        timeout: Duration,
    ) -> ProvisionResult<ConnectionConfig>;

    /// Stop the instance; a no-op when nothing is running
    async fn stop(&mut self) -> ProvisionResult<()>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Pick the provisioner `settings` asks for
pub fn for_settings(settings: &FixtureSettings) -> Box<dyn Provisioner> {
    match settings.external_url {
        Some(ref url) => Box::new(ExternalProvisioner::new(url.clone())),
        None => Box::new(ContainerProvisioner::new()),
    }
}
