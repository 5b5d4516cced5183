//! Error types for pgharness
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.

use std::io;
use std::time::Duration;

/// Main error type for pgharness
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The ephemeral instance could not be provisioned
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// The per-test reset failed
    #[error("Reset error: {0}")]
    Reset(#[from] ResetError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure to bring an ephemeral instance up (or down).
///
/// Fatal to every test sharing the fixture. The fixture remembers the
/// first provisioning error and hands out clones of it afterwards, so the
/// type is `Clone` and carries rendered messages rather than sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisioningError {
    /// The provisioner could not start the instance
    #[error("Failed to start database instance: {0}")]
    Start(String),

    /// The instance started but its endpoint could not be determined
    #[error("Failed to resolve database endpoint: {0}")]
    Endpoint(String),

    /// The instance did not accept connections before the deadline
    #[error("Database not ready after {waited:?}: {last_error}")]
    Timeout { waited: Duration, last_error: String },

    /// Stopping or removing the instance failed
    #[error("Failed to stop database instance: {0}")]
    Stop(String),

    /// The fixture was already terminated
    #[error("Fixture has been terminated")]
    Terminated,

    /// Settings were unusable for provisioning
    #[error("Invalid provisioning settings: {0}")]
    Config(String),
}

/// Failure of the truncate-everything step that runs before each test.
#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    /// Reset was requested before `acquire()` completed, or after termination
    #[error("Fixture is not ready")]
    NotReady,

    /// Could not open a connection to the instance
    #[error("Connection failed: {0}")]
    Connect(#[source] DbError),

    /// Listing the tables of the schema failed
    #[error("Table discovery failed in schema '{schema}': {source}")]
    Discover {
        schema: String,
        #[source]
        source: DbError,
    },

    /// The truncate statement failed; no table was reset
    #[error("Truncate failed: {0}")]
    Truncate(#[source] DbError),
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Platform config directory not found
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// IO errors while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Specialized Result type for pgharness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Specialized Result type for provisioning
pub type ProvisionResult<T> = std::result::Result<T, ProvisioningError>;

/// Specialized Result type for resets
pub type ResetResult<T> = std::result::Result<T, ResetError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
