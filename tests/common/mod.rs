//! Common test utilities and helpers
//!
//! Shared test infrastructure for the integration tests.

use pgharness::db::PostgresExecutor;
use pgharness::logging::init_test_logging;
use pgharness::shared::{self, IsolatedTest};
use pgharness::HarnessError;

/// Tables used across the integration tests
///
/// `articles.author_id` references `authors.id`; `countries` stands in for
/// reference data.
pub const BLOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS authors (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS articles (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        author_id INTEGER NOT NULL REFERENCES authors (id),
        title VARCHAR(255) NOT NULL
    );
    CREATE TABLE IF NOT EXISTS countries (
        code CHAR(2) PRIMARY KEY,
        name TEXT NOT NULL
    );
";

/// Exclusive access to the shared fixture, or `None` when Docker (or the
/// configured external database) is unavailable
pub async fn isolated_or_skip() -> Option<IsolatedTest> {
    init_test_logging();
    match shared::isolated().await {
        Ok(db) => Some(db),
        Err(HarnessError::Provisioning(e)) => {
            eprintln!("Skipping test: PostgreSQL not available - {}", e);
            None
        }
        Err(e) => panic!("Fixture setup failed: {}", e),
    }
}

/// Connect and make sure the blog tables exist
pub async fn blog_connection(db: &IsolatedTest) -> PostgresExecutor {
    let conn = db.connect().await.expect("connect to fixture");
    conn.client()
        .batch_execute(BLOG_SCHEMA)
        .await
        .expect("create blog schema");
    conn
}

pub async fn insert_author(conn: &PostgresExecutor, name: &str) -> i32 {
    conn.client()
        .query_one("INSERT INTO authors (name) VALUES ($1) RETURNING id", &[&name])
        .await
        .expect("insert author")
        .get(0)
}

pub async fn insert_article(conn: &PostgresExecutor, author_id: i32, title: &str) -> i64 {
    conn.client()
        .query_one(
            "INSERT INTO articles (author_id, title) VALUES ($1, $2) RETURNING id",
            &[&author_id, &title],
        )
        .await
        .expect("insert article")
        .get(0)
}

pub async fn count(conn: &PostgresExecutor, table: &str) -> i64 {
    conn.row_count("public", table).await.expect("count rows")
}
