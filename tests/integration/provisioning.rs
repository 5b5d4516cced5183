//! Provisioning against a real container runtime

use crate::common::isolated_or_skip;
use pgharness::config::{FixtureSettings, PropertyRegistry};
use pgharness::{FixturePhase, PostgresFixture, ProvisioningError};

#[tokio::test]
async fn test_shared_acquire_is_idempotent() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let first = db.acquire().await.unwrap();
    let second = db.acquire().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(db.connection_config(), Some(first));
    assert_eq!(db.phase(), FixturePhase::Ready);
}

#[tokio::test]
async fn test_registered_properties_reach_the_instance() {
    let Some(db) = isolated_or_skip().await else {
        return;
    };
    let mut properties = PropertyRegistry::new();
    db.register_properties(&mut properties).await.unwrap();

    let url = properties.get("datasource.url").unwrap();
    let username = properties.get("datasource.username").unwrap();
    let password = properties.get("datasource.password").unwrap();

    // Connect the way an application would, from the three properties alone
    let mut config = pgharness::config::ConnectionConfig::from_url(url).unwrap();
    config.username = username.to_string();
    config.password = Some(password.to_string());
    let conn = pgharness::db::PostgresExecutor::connect(&config).await.unwrap();
    conn.ping().await.unwrap();
}

/// A dedicated fixture owns its own container; it never resets, so it can
/// run alongside the shared-fixture tests.
#[tokio::test]
async fn test_dedicated_fixture_lifecycle() {
    pgharness::logging::init_test_logging();
    let settings = FixtureSettings {
        external_url: None,
        ..FixtureSettings::load().unwrap_or_default()
    };
    let fixture = PostgresFixture::new(settings);
    assert_eq!(fixture.phase(), FixturePhase::Uninitialized);
    assert_eq!(fixture.connection_config(), None);

    let first = match fixture.acquire().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Skipping test: Docker not available - {}", e);
            return;
        }
    };
    let second = fixture.acquire().await.unwrap();
    assert_eq!(first, second, "second acquire must reuse the instance");

    let conn = fixture.connect().await.unwrap();
    conn.ping().await.unwrap();
    drop(conn);

    fixture.terminate().await.unwrap();
    assert_eq!(fixture.phase(), FixturePhase::Terminated);
    assert_eq!(
        fixture.acquire().await.unwrap_err(),
        ProvisioningError::Terminated
    );
}
