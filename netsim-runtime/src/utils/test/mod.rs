//! Fixtures for exercising hosts: a scriptable DHCP server, a forwarding router, frame builders
//! and ready-made topologies. Shared by the unit tests and the integration tests under `tests/`.
pub mod harness;

use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test writer so it only shows for failing tests.
/// `RUST_LOG` picks the level; safe to call from every test.
pub fn set_logger_for_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
