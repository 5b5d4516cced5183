//! Docker-backed provisioning through testcontainers
//!
//! Uses the blocking runner on tokio's blocking pool. The resulting
//! container handle owns its own runtime, so it keeps working after the
//! test runtime that created it has shut down.

use crate::config::{ConnectionConfig, FixtureSettings};
use crate::error::{ProvisionResult, ProvisioningError};
use crate::provision::Provisioner;
use async_trait::async_trait;
use std::time::Duration;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ContainerRequest, ImageExt, TestcontainersError};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::oneshot;

/// Port PostgreSQL listens on inside the container
const POSTGRES_PORT: u16 = 5432;

/// Runs `postgres:<tag>` in a throwaway container
#[derive(Default)]
pub struct ContainerProvisioner {
    container: Option<Container<Postgres>>,
}

impl ContainerProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker id of the running container
    pub fn container_id(&self) -> Option<&str> {
        self.container.as_ref().map(|c| c.id())
    }
}

#[async_trait]
impl Provisioner for ContainerProvisioner {
    async fn start(
        &mut self,
        settings: &FixtureSettings,
        timeout: Duration,
    ) -> ProvisionResult<ConnectionConfig> {
        if let Some(id) = self.container_id() {
            return Err(ProvisioningError::Start(format!(
                "container {} is already running",
                id
            )));
        }

        let image = Postgres::default()
            .with_db_name(&settings.database)
            .with_user(&settings.username)
            .with_password(&settings.password);
        let request = image
            .with_tag(settings.image_tag.clone())
            .with_startup_timeout(timeout);
        let request = match settings.container_name {
            Some(ref name) => request.with_container_name(name.clone()),
            None => request,
        };

        // A receiver dropped on timeout leaves the container to the blocking
        // task, which removes it
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            if let Err(Ok((container, _, _))) = tx.send(launch(request)) {
                tracing::warn!(
                    container = container.id(),
                    "container started after provisioning was abandoned, removing it"
                );
                discard(container);
            }
        });
        let (container, host, port) = rx
            .await
            .map_err(|_| ProvisioningError::Start("provisioning task failed".to_string()))??;

        tracing::info!(
            container = container.id(),
            image = %format!("postgres:{}", settings.image_tag),
            port,
            "PostgreSQL container started"
        );

        self.container = Some(container);
        Ok(ConnectionConfig {
            host,
            ..ConnectionConfig::local(
                port,
                &settings.database,
                &settings.username,
                &settings.password,
            )
        })
    }

    async fn stop(&mut self) -> ProvisionResult<()> {
        let Some(container) = self.container.take() else {
            return Ok(());
        };
        let id = container.id().to_string();

        tokio::task::spawn_blocking(move || -> Result<(), TestcontainersError> {
            container.stop()?;
            container.rm()
        })
        .await
        .map_err(|e| ProvisioningError::Stop(format!("teardown task failed: {}", e)))?
        .map_err(|e| ProvisioningError::Stop(e.to_string()))?;

        tracing::info!(container = %id, "PostgreSQL container removed");
        Ok(())
    }

    fn describe(&self) -> String {
        match self.container_id() {
            Some(id) => format!("container {}", id),
            None => "container (not started)".to_string(),
        }
    }
}

impl Drop for ContainerProvisioner {
    fn drop(&mut self) {
        if let Some(container) = self.container.take() {
            tracing::warn!(
                container = container.id(),
                "container provisioner dropped without stop(), removing container"
            );
            discard(container);
        }
    }
}

/// Start the container and look up its mapped endpoint; blocking
fn launch(
    request: ContainerRequest<Postgres>,
) -> ProvisionResult<(Container<Postgres>, String, u16)> {
    // On a failed wait testcontainers removes the container itself
    let container = request
        .start()
        .map_err(|e| ProvisioningError::Start(e.to_string()))?;
    let endpoint = container.get_host().and_then(|host| {
        let port = container.get_host_port_ipv4(POSTGRES_PORT.tcp())?;
        Ok((host.to_string(), port))
    });
    match endpoint {
        Ok((host, port)) => Ok((container, host, port)),
        Err(e) => {
            discard(container);
            Err(ProvisioningError::Endpoint(e.to_string()))
        }
    }
}

/// Drop a container off any async context
///
/// The blocking container's destructor drives its own runtime, which
/// panics on a thread that is already running one.
fn discard(container: Container<Postgres>) {
    let joined = std::thread::spawn(move || drop(container)).join();
    if joined.is_err() {
        tracing::error!("failed to remove PostgreSQL container");
    }
}
