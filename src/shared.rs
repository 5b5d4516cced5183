//! Process-wide shared fixture
//!
//! Starting a container per test is slow, so test binaries usually share
//! one instance. The instance is created lazily on first use and
//! terminated when the process exits.
//!
//! libtest runs tests on parallel threads, and a reset in one test would
//! wipe rows another test is still using. [`isolated`] therefore hands out
//! a guard holding a process-wide lock: tests that go through it run one at
//! a time, each starting from empty tables. Separate test processes each
//! get their own instance.

use crate::config::FixtureSettings;
use crate::error::{ConfigError, Result};
use crate::fixture::PostgresFixture;
use crate::reset::ResetReport;
use std::ops::Deref;
use tokio::sync::{Mutex, MutexGuard, OnceCell};

static SHARED: OnceCell<PostgresFixture> = OnceCell::const_new();
static SERIAL: Mutex<()> = Mutex::const_new(());

/// The shared fixture, provisioned
///
/// Settings come from [`FixtureSettings::load`].
pub async fn fixture() -> Result<&'static PostgresFixture> {
    let fixture = SHARED
        .get_or_try_init(|| async {
            let settings = FixtureSettings::load()?;
            Ok::<_, ConfigError>(PostgresFixture::new(settings))
        })
        .await?;
    fixture.acquire().await?;
    Ok(fixture)
}

/// Exclusive, freshly reset access to the shared fixture
///
/// Hold it for the whole test body.
pub struct IsolatedTest {
    fixture: &'static PostgresFixture,
    report: ResetReport,
    _serial: MutexGuard<'static, ()>,
}

impl IsolatedTest {
    /// What the reset before this test truncated
    pub fn report(&self) -> &ResetReport {
        &self.report
    }
}

impl Deref for IsolatedTest {
    type Target = PostgresFixture;

    fn deref(&self) -> &Self::Target {
        self.fixture
    }
}

/// Wait for exclusive use of the shared fixture, then reset it
pub async fn isolated() -> Result<IsolatedTest> {
    let serial = SERIAL.lock().await;
    let fixture = fixture().await?;
    let report = fixture.reset_between_tests().await?;
    Ok(IsolatedTest {
        fixture,
        report,
        _serial: serial,
    })
}

#[ctor::dtor]
fn terminate_shared() {
    if let Some(fixture) = SHARED.get() {
        shutdown(fixture);
    }
}

/// Terminate `fixture` from outside any runtime; `true` when it stopped cleanly
fn shutdown(fixture: &PostgresFixture) -> bool {
    // Test runtimes are gone by now; teardown needs one of its own
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(fixture = %fixture.id(), error = %e, "no runtime for shared teardown");
            return false;
        }
    };
    match rt.block_on(fixture.terminate()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(fixture = %fixture.id(), error = %e, "failed to stop shared PostgreSQL");
            false
        }
    }
}
