//! PostgreSQL executor
//!
//! Concrete implementation using tokio-postgres.

use crate::config::ConnectionConfig;
use crate::config::connections::SslMode;
use crate::db::executor::SqlExecutor;
use crate::db::schema::{ColumnShape, TableShape};
use crate::error::{DbError, DbResult};
use crate::reset::quote_ident;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

/// A single connection to a PostgreSQL instance
///
/// The background connection task runs on the runtime that called
/// [`PostgresExecutor::connect`]; the executor must not outlive it.
pub struct PostgresExecutor {
    client: Client,
}

impl PostgresExecutor {
    /// Connect to a PostgreSQL database.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let conn_string = config.connection_string_with_password();

        let client = match config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                        .await
                        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::warn!(error = %e, "postgres connection closed with error");
                    }
                });
                client
            }
            SslMode::Prefer | SslMode::Require => {
                let tls_config = make_tls_config();
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::warn!(error = %e, "postgres connection closed with error");
                    }
                });
                client
            }
        };

        Ok(Self { client })
    }

    /// Connect, giving up after `timeout`
    pub async fn connect_within(config: &ConnectionConfig, timeout: Duration) -> DbResult<Self> {
        tokio::time::timeout(timeout, Self::connect(config))
            .await
            .map_err(|_| DbError::Timeout)?
    }

    /// Underlying client, for test code that needs the full query API
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Round-trip `SELECT 1`
    pub async fn ping(&self) -> DbResult<()> {
        let row = self
            .client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;
        let one: i32 = row
            .try_get(0)
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;
        if one == 1 {
            Ok(())
        } else {
            Err(DbError::QueryFailed(format!("SELECT 1 returned {}", one)))
        }
    }

    /// Number of rows in `schema.table`
    pub async fn row_count(&self, schema: &str, table: &str) -> DbResult<i64> {
        let sql = format!(
            "SELECT count(*) FROM {}.{}",
            quote_ident(schema),
            quote_ident(table)
        );
        let row = self
            .client
            .query_one(&sql, &[])
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;
        row.try_get(0)
            .map_err(|e| DbError::QueryFailed(e.to_string()))
    }

    /// Row counts of every table in `schema`
    pub async fn row_counts(&self, schema: &str) -> DbResult<BTreeMap<String, i64>> {
        let tables = self
            .fetch_column(
                "SELECT tablename::text FROM pg_tables WHERE schemaname = $1 ORDER BY tablename",
                &[schema],
            )
            .await?;
        let mut counts = BTreeMap::new();
        for table in tables {
            let count = self.row_count(schema, &table).await?;
            counts.insert(table, count);
        }
        Ok(counts)
    }

    /// Column and constraint definitions of every table in `schema`
    pub async fn describe_tables(&self, schema: &str) -> DbResult<Vec<TableShape>> {
        let map_err = |e: tokio_postgres::Error| DbError::QueryFailed(e.to_string());

        let column_rows = self
            .client
            .query(
                "SELECT c.relname::text, a.attname::text, \
                        format_type(a.atttypid, a.atttypmod), NOT a.attnotnull, \
                        pg_get_expr(d.adbin, d.adrelid) \
                 FROM pg_class c \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 JOIN pg_attribute a ON a.attrelid = c.oid \
                 LEFT JOIN pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum \
                 WHERE c.relkind IN ('r', 'p') \
                   AND n.nspname = $1 \
                   AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY c.relname, a.attnum",
                &[&schema],
            )
            .await
            .map_err(map_err)?;

        let constraint_rows = self
            .client
            .query(
                "SELECT c.relname::text, con.conname::text, con.contype::text \
                 FROM pg_constraint con \
                 JOIN pg_class c ON c.oid = con.conrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE n.nspname = $1 \
                 ORDER BY c.relname, con.conname",
                &[&schema],
            )
            .await
            .map_err(map_err)?;

        let mut tables: BTreeMap<String, TableShape> = BTreeMap::new();
        for row in &column_rows {
            let table: String = row.get(0);
            let entry = tables.entry(table.clone()).or_insert_with(|| TableShape {
                name: table,
                columns: Vec::new(),
                constraints: Vec::new(),
            });
            entry.columns.push(ColumnShape {
                name: row.get(1),
                data_type: row.get(2),
                nullable: row.get(3),
                default: row.get(4),
            });
        }
        for row in &constraint_rows {
            let table: String = row.get(0);
            if let Some(shape) = tables.get_mut(&table) {
                shape.constraints.push((row.get(1), row.get(2)));
            }
        }

        Ok(tables.into_values().collect())
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn fetch_column(&self, sql: &str, params: &[&str]) -> DbResult<Vec<String>> {
        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(sql, &params)
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| DbError::QueryFailed(e.to_string()))
            })
            .collect()
    }

    async fn execute_atomic(&mut self, statements: &[String]) -> DbResult<()> {
        let map_err = |e: tokio_postgres::Error| DbError::QueryFailed(e.to_string());

        // Dropping an uncommitted transaction rolls it back
        let tx = self.client.transaction().await.map_err(map_err)?;
        for statement in statements {
            tx.batch_execute(statement).await.map_err(map_err)?;
        }
        tx.commit().await.map_err(map_err)
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}
