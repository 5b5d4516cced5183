//! pgharness - Disposable PostgreSQL for integration tests
//!
//! pgharness starts a throwaway PostgreSQL instance (a Docker container by
//! default), hands its coordinates to the application under test, and
//! empties every table before each test so no test sees another's rows.
//!
//! # Features
//!
//! - **Lazy provisioning**: the instance starts on first use, once
//! - **Readiness probing**: start-up waits for `SELECT 1`, bounded by a timeout
//! - **Per-test reset**: `TRUNCATE ... RESTART IDENTITY CASCADE` over every table
//! - **Configuration override**: `datasource.url`/`username`/`password` for the app
//! - **External databases**: point at an existing test database instead of Docker
//!
//! # Architecture
//!
//! - [`fixture`]: the fixture and its lifecycle
//! - [`shared`]: one fixture per test process, serialised across threads
//! - [`provision`]: container and external provisioners, readiness probe
//! - [`reset`]: table discovery and truncation
//! - [`db`]: SQL executor trait and its tokio-postgres implementation
//! - [`config`]: endpoints, settings, configuration overrides
//! - [`error`]: error types and result aliases
//! - [`logging`]: tracing setup for test binaries
//!
//! # Example
//!
//! ```no_run
//! use pgharness::config::PropertyRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serialised, freshly truncated access to the process-wide instance
//! let db = pgharness::shared::isolated().await?;
//!
//! // Hand the endpoint to the application under test
//! let mut properties = PropertyRegistry::new();
//! db.register_properties(&mut properties).await?;
//! println!("app connects to {:?}", properties.get("datasource.url"));
//!
//! // Talk to the database directly
//! let conn = db.connect().await?;
//! conn.client().batch_execute("CREATE TABLE IF NOT EXISTS users (id SERIAL PRIMARY KEY)").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod provision;
pub mod reset;
pub mod shared;

pub use error::{ConfigError, DbError, HarnessError, ProvisioningError, ResetError, Result};
pub use fixture::{FixturePhase, PostgresFixture};
