//! SQL executor trait
//!
//! The reset logic only needs two capabilities from a database: read one
//! text column, and run a group of statements atomically. Keeping them
//! behind a trait lets the reset be exercised without a server.

use crate::error::DbResult;
use async_trait::async_trait;

/// Minimal SQL execution interface
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a query and return its first column as text
    ///
    /// # Arguments
    /// * `sql` - Query with `$1`, `$2`... placeholders
    /// * `params` - Text parameters bound in order
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if the query fails
    async fn fetch_column(&self, sql: &str, params: &[&str]) -> DbResult<Vec<String>>;

    /// Execute statements in a single transaction
    ///
    /// Either every statement takes effect or none does.
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if any statement fails; the
    /// transaction is rolled back
    async fn execute_atomic(&mut self, statements: &[String]) -> DbResult<()>;
}
