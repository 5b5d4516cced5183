//! Ephemeral database fixture
//!
//! Owns one disposable PostgreSQL instance for its lifetime:
//!
//! ```text
//! Uninitialized -> Provisioning -> Ready -> Terminated
//!                       |
//!                       +-------> Failed
//! ```
//!
//! `Provisioning` happens once, on the first [`PostgresFixture::acquire`].
//! Resets loop on `Ready`. A failed provisioning attempt is not retried;
//! every later `acquire` returns the same error.
//!
//! No client connection is cached. Each reset and each [`PostgresFixture::connect`]
//! opens a new connection on the caller's runtime, so one fixture can serve
//! many `#[tokio::test]` functions, each with its own runtime.

use crate::config::{ConnectionConfig, DatasourceProperties, FixtureSettings, PropertySink};
use crate::db::{PostgresExecutor, SqlExecutor};
use crate::error::{ProvisionResult, ProvisioningError, ResetError, ResetResult, Result};
use crate::provision::{self, Provisioner, QueryProbe, ReadinessProbe};
use crate::reset::{self, ResetOptions, ResetReport};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Lifecycle phase of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FixturePhase {
    Uninitialized = 0,
    Provisioning = 1,
    Ready = 2,
    Failed = 3,
    Terminated = 4,
}

impl FixturePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => FixturePhase::Uninitialized,
            1 => FixturePhase::Provisioning,
            2 => FixturePhase::Ready,
            3 => FixturePhase::Failed,
            _ => FixturePhase::Terminated,
        }
    }
}

enum State {
    Idle,
    Ready(ConnectionConfig),
    Failed(ProvisioningError),
    Terminated,
}

struct Inner {
    provisioner: Box<dyn Provisioner>,
    state: State,
}

/// A disposable PostgreSQL instance plus the per-test reset
pub struct PostgresFixture {
    id: Uuid,
    settings: FixtureSettings,
    reset_options: ResetOptions,
    probe: Box<dyn ReadinessProbe>,
    inner: Mutex<Inner>,
    phase: AtomicU8,
    endpoint: OnceLock<ConnectionConfig>,
}

impl PostgresFixture {
    /// Fixture using the provisioner `settings` asks for
    pub fn new(settings: FixtureSettings) -> Self {
        let provisioner = provision::for_settings(&settings);
        Self::with_provisioner(settings, provisioner)
    }

    pub fn with_provisioner(settings: FixtureSettings, provisioner: Box<dyn Provisioner>) -> Self {
        Self::with_parts(settings, provisioner, Box::new(QueryProbe))
    }

    pub fn with_parts(
        settings: FixtureSettings,
        provisioner: Box<dyn Provisioner>,
        probe: Box<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reset_options: ResetOptions::from_settings(&settings),
            settings,
            probe,
            inner: Mutex::new(Inner {
                provisioner,
                state: State::Idle,
            }),
            phase: AtomicU8::new(FixturePhase::Uninitialized as u8),
            endpoint: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &FixtureSettings {
        &self.settings
    }

    pub fn phase(&self) -> FixturePhase {
        FixturePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: FixturePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Provision the instance on first call; return its endpoint
    ///
    /// Concurrent callers wait for the same attempt. Blocks for at most the
    /// configured startup timeout.
    pub async fn acquire(&self) -> ProvisionResult<ConnectionConfig> {
        if let Some(config) = self.connection_config() {
            return Ok(config);
        }

        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Ready(ref config) => return Ok(config.clone()),
            State::Failed(ref err) => return Err(err.clone()),
            State::Terminated => return Err(ProvisioningError::Terminated),
            State::Idle => {}
        }

        self.set_phase(FixturePhase::Provisioning);
        tracing::info!(
            fixture = %self.id,
            provisioner = %inner.provisioner.describe(),
            timeout = ?self.settings.startup_timeout(),
            "provisioning PostgreSQL"
        );

        match self.provision(inner.provisioner.as_mut()).await {
            Ok(config) => {
                tracing::info!(fixture = %self.id, url = %config.url(), "PostgreSQL ready");
                inner.state = State::Ready(config.clone());
                let _ = self.endpoint.set(config.clone());
                self.set_phase(FixturePhase::Ready);
                Ok(config)
            }
            Err(err) => {
                tracing::error!(fixture = %self.id, error = %err, "provisioning failed");
                inner.state = State::Failed(err.clone());
                self.set_phase(FixturePhase::Failed);
                Err(err)
            }
        }
    }

    async fn provision(&self, provisioner: &mut dyn Provisioner) -> ProvisionResult<ConnectionConfig> {
        let timeout = self.settings.startup_timeout();
        let started = Instant::now();
        let deadline = started + timeout;

        let starting = provisioner.start(&self.settings, timeout);
        let config = match tokio::time::timeout_at(deadline, starting).await {
            Ok(result) => result?,
            Err(_) => {
                let err = ProvisioningError::Timeout {
                    waited: started.elapsed(),
                    last_error: format!("{} did not start in time", provisioner.describe()),
                };
                self.stop_after_failure(provisioner).await;
                return Err(err);
            }
        };

        if let Err(err) = self
            .probe
            .wait(&config, started, deadline, self.settings.probe_interval())
            .await
        {
            self.stop_after_failure(provisioner).await;
            return Err(err);
        }

        Ok(config)
    }

    /// Release a half-started instance before reporting the failure
    async fn stop_after_failure(&self, provisioner: &mut dyn Provisioner) {
        if let Err(err) = provisioner.stop().await {
            tracing::warn!(fixture = %self.id, error = %err, "cleanup after failed provisioning");
        }
    }

    /// Endpoint of the live instance; `None` unless the fixture is ready
    pub fn connection_config(&self) -> Option<ConnectionConfig> {
        if self.phase() != FixturePhase::Ready {
            return None;
        }
        self.endpoint.get().cloned()
    }

    /// Datasource overrides for the live instance
    pub fn properties(&self) -> Option<DatasourceProperties> {
        self.connection_config()
            .map(|config| DatasourceProperties::from_config(&config))
    }

    /// Acquire, then write the datasource overrides into `sink`
    pub async fn register_properties<S>(&self, sink: &mut S) -> ProvisionResult<()>
    where
        S: PropertySink + ?Sized,
    {
        let config = self.acquire().await?;
        DatasourceProperties::from_config(&config).write_to(&self.settings.property_prefix, sink);
        Ok(())
    }

    /// New connection to the instance, acquiring it first if needed
    pub async fn connect(&self) -> Result<PostgresExecutor> {
        let config = self.acquire().await?;
        Ok(PostgresExecutor::connect(&config).await?)
    }

    /// Empty every table of the configured schema and restart identities
    ///
    /// Call before each test. Fails the test, not the fixture.
    pub async fn reset_between_tests(&self) -> ResetResult<ResetReport> {
        let config = self.connection_config().ok_or(ResetError::NotReady)?;
        let mut executor = PostgresExecutor::connect(&config)
            .await
            .map_err(ResetError::Connect)?;
        self.reset_using(&mut executor).await
    }

    /// Reset through an existing executor
    pub async fn reset_using<E>(&self, executor: &mut E) -> ResetResult<ResetReport>
    where
        E: SqlExecutor + ?Sized,
    {
        if self.phase() != FixturePhase::Ready {
            return Err(ResetError::NotReady);
        }
        let report = reset::reset_schema(executor, &self.reset_options).await?;
        tracing::debug!(
            fixture = %self.id,
            tables = report.tables.len(),
            elapsed = ?report.elapsed,
            "reset between tests"
        );
        Ok(report)
    }

    /// Stop the instance; the fixture cannot be used afterwards
    pub async fn terminate(&self) -> ProvisionResult<()> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, State::Terminated) {
            return Ok(());
        }
        inner.state = State::Terminated;
        self.set_phase(FixturePhase::Terminated);

        let result = inner.provisioner.stop().await;
        match result {
            Ok(()) => tracing::info!(fixture = %self.id, "fixture terminated"),
            Err(ref err) => tracing::warn!(fixture = %self.id, error = %err, "teardown failed"),
        }
        result
    }
}
