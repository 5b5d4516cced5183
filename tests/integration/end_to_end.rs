//! Acquire, insert, reset, insert again

use crate::common::{blog_connection, count, insert_author, isolated_or_skip};
use pgharness::FixturePhase;

#[tokio::test]
async fn test_end_to_end_reset_cycle() -> anyhow::Result<()> {
    let Some(db) = isolated_or_skip().await else {
        return Ok(());
    };
    assert_eq!(db.phase(), FixturePhase::Ready);

    let conn = blog_connection(&db).await;
    let id = insert_author(&conn, "Alan").await;
    assert_eq!(id, 1);
    assert_eq!(count(&conn, "authors").await, 1);

    let report = db.reset_between_tests().await?;
    assert_eq!(report.schema, "public");
    assert_eq!(count(&conn, "authors").await, 0);

    let id = insert_author(&conn, "Alonzo").await;
    assert_eq!(id, 1, "identity should restart at its initial value");

    let properties = db.properties().ok_or_else(|| anyhow::anyhow!("fixture not ready"))?;
    let live = db.connection_config().ok_or_else(|| anyhow::anyhow!("fixture not ready"))?;
    assert_eq!(properties.url, live.url());
    Ok(())
}
