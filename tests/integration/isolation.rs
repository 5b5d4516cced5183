//! Reset behaviour against a real instance

use crate::common::{
    blog_connection, count, insert_article, insert_author, isolated_or_skip,
};
use pgharness::PostgresFixture;
use pgharness::config::FixtureSettings;
use pgharness::provision::ExternalProvisioner;

#[tokio::test]
async fn test_rows_do_not_leak_into_next_test() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;
    let author = insert_author(&conn, "Ada").await;
    insert_article(&conn, author, "Notes").await;
    conn.client()
        .execute("INSERT INTO countries (code, name) VALUES ('NO', 'Norway')", &[])
        .await
        .unwrap();
    drop(conn);
    drop(db);

    // Next test's view of the database
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = db.connect().await.unwrap();
    let counts = conn.row_counts("public").await.unwrap();
    assert!(counts.contains_key("authors"));
    for (table, rows) in &counts {
        assert_eq!(*rows, 0, "table {} should be empty after reset", table);
    }
    assert!(db.report().tables.iter().any(|t| t == "articles"));
}

#[tokio::test]
async fn test_reset_preserves_schema() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;
    let author = insert_author(&conn, "Grace").await;
    insert_article(&conn, author, "Compilers").await;

    let before = conn.describe_tables("public").await.unwrap();
    db.reset_between_tests().await.unwrap();
    let after = conn.describe_tables("public").await.unwrap();

    assert_eq!(before, after);
    let articles = after.iter().find(|t| t.name == "articles").unwrap();
    assert!(articles.has_foreign_key());
    assert_eq!(
        articles.column("title").unwrap().data_type,
        "character varying(255)"
    );
}

#[tokio::test]
async fn test_reset_restarts_identity() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;

    let mut last_author = 0;
    let mut last_article = 0;
    for i in 0..5 {
        last_author = insert_author(&conn, &format!("author {}", i)).await;
        last_article = insert_article(&conn, last_author, "draft").await;
    }
    assert_eq!(last_author, 5);
    assert_eq!(last_article, 5);

    db.reset_between_tests().await.unwrap();

    let author = insert_author(&conn, "fresh").await;
    let article = insert_article(&conn, author, "fresh").await;
    assert_eq!(author, 1, "serial sequence should restart");
    assert_eq!(article, 1, "identity column should restart");
}

#[tokio::test]
async fn test_reset_cascades_through_foreign_keys() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;
    let author = insert_author(&conn, "Barbara").await;
    insert_article(&conn, author, "Abstraction").await;

    let report = db.reset_between_tests().await.unwrap();

    assert!(report.tables.iter().any(|t| t == "authors"));
    assert_eq!(count(&conn, "authors").await, 0);
    assert_eq!(count(&conn, "articles").await, 0);
}

#[tokio::test]
async fn test_reset_only_touches_configured_schema() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;
    conn.client()
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS audit;
             CREATE TABLE IF NOT EXISTS audit.events (id SERIAL PRIMARY KEY, kind TEXT);
             DELETE FROM audit.events;
             INSERT INTO audit.events (kind) VALUES ('login');",
        )
        .await
        .unwrap();
    insert_author(&conn, "Edsger").await;

    db.reset_between_tests().await.unwrap();

    assert_eq!(count(&conn, "authors").await, 0);
    assert_eq!(conn.row_count("audit", "events").await.unwrap(), 1);
    conn.client().batch_execute("DROP SCHEMA audit CASCADE").await.unwrap();
}

#[tokio::test]
async fn test_preserved_tables_keep_rows() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let conn = blog_connection(&db).await;
    conn.client()
        .execute("INSERT INTO countries (code, name) VALUES ('SE', 'Sweden')", &[])
        .await
        .unwrap();
    insert_author(&conn, "Tony").await;

    // Second fixture over the same instance, keeping reference data
    let live = db.connection_config().unwrap();
    let settings = FixtureSettings {
        preserve_tables: vec!["countries".to_string()],
        ..db.settings().clone()
    };
    let seeded = PostgresFixture::with_provisioner(
        settings,
        Box::new(ExternalProvisioner::new(live.url_with_credentials())),
    );
    seeded.acquire().await.unwrap();

    let report = seeded.reset_between_tests().await.unwrap();
    seeded.terminate().await.unwrap();

    assert!(!report.tables.iter().any(|t| t == "countries"));
    assert_eq!(count(&conn, "countries").await, 1);
    assert_eq!(count(&conn, "authors").await, 0);
}
