//! Database access
//!
//! A trait-based executor used by the reset logic, its tokio-postgres
//! implementation, and catalog snapshots for verifying resets.

pub mod executor;
pub mod postgres;
pub mod schema;

pub use executor::SqlExecutor;
pub use postgres::PostgresExecutor;
pub use schema::{ColumnShape, TableShape};
