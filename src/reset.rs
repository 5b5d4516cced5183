//! Per-test reset
//!
//! Empties every table of a schema and restarts its identity sequences,
//! leaving table definitions alone. Tables are discovered from the catalog
//! on every call and truncated by one statement, so foreign keys between
//! them never get in the way and the reset is all-or-nothing.

use crate::config::FixtureSettings;
use crate::db::SqlExecutor;
use crate::error::{ResetError, ResetResult};
use std::time::{Duration, Instant};

/// Lists the ordinary tables of a schema
pub const TABLES_QUERY: &str =
    "SELECT tablename::text FROM pg_tables WHERE schemaname = $1 ORDER BY tablename";

/// What a reset touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOptions {
    pub schema: String,
    /// Tables excluded from truncation
    ///
    /// `CASCADE` still empties a preserved table if it references a
    /// truncated one.
    pub preserve: Vec<String>,
}

impl ResetOptions {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            preserve: Vec::new(),
        }
    }

    pub fn from_settings(settings: &FixtureSettings) -> Self {
        Self {
            schema: settings.schema.clone(),
            preserve: settings.preserve_tables.clone(),
        }
    }
}

/// Outcome of a successful reset
#[derive(Debug, Clone)]
pub struct ResetReport {
    pub schema: String,
    /// Tables named in the truncate statement
    pub tables: Vec<String>,
    pub elapsed: Duration,
}

/// Quote an identifier the way PostgreSQL's `quote_ident` does, minus the
/// shortcut for names that need no quoting
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `TRUNCATE` for the given tables, or `None` when there is nothing to do
pub fn truncate_statement(schema: &str, tables: &[String]) -> Option<String> {
    if tables.is_empty() {
        return None;
    }
    let schema = quote_ident(schema);
    let targets: Vec<String> = tables
        .iter()
        .map(|t| format!("{}.{}", schema, quote_ident(t)))
        .collect();
    Some(format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
        targets.join(", ")
    ))
}

/// Discover the tables of `options.schema` and truncate them
pub async fn reset_schema<E>(executor: &mut E, options: &ResetOptions) -> ResetResult<ResetReport>
where
    E: SqlExecutor + ?Sized,
{
    let start = Instant::now();

    let tables: Vec<String> = executor
        .fetch_column(TABLES_QUERY, &[options.schema.as_str()])
        .await
        .map_err(|source| ResetError::Discover {
            schema: options.schema.clone(),
            source,
        })?
        .into_iter()
        .filter(|t| !options.preserve.contains(t))
        .collect();

    if let Some(statement) = truncate_statement(&options.schema, &tables) {
        executor
            .execute_atomic(std::slice::from_ref(&statement))
            .await
            .map_err(ResetError::Truncate)?;
    }

    let report = ResetReport {
        schema: options.schema.clone(),
        tables,
        elapsed: start.elapsed(),
    };
    tracing::debug!(
        schema = %report.schema,
        tables = report.tables.len(),
        elapsed = ?report.elapsed,
        "truncated schema"
    );
    Ok(report)
}
