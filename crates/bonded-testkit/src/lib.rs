//! Bonded Testkit - fixtures for bonded role tests
//!
//! Deterministic keys, in-memory collaborators and a ready-wired registry:
//!
//! ```rust,ignore
//! let fx = RegistryFixture::new();
//! let alice = fx.node("alice");
//! fx.registry.submit(fx.bonded_claim(&alice, RoleType::Mediator, 100, 200)).await?;
//! ```

pub mod fixtures;
pub mod keys;
pub mod mocks;
pub mod strategies;
pub mod time;

pub use fixtures::{test_config, RegistryFixture};
pub use keys::TestNode;
pub use mocks::{MemoryPersistence, MockBondLedger, MockIdentityService};
pub use time::ManualClock;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// Install a test-friendly tracing subscriber once per process
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    Lazy::force(&TRACING);
}
