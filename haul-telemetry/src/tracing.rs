use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "haul=info";

/// Filter applied to tests when `RUST_LOG` is not set.
const DEFAULT_TEST_FILTER: &str = "haul=debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG`, falling back to `haul=info`. Must be called at most once per
/// process, typically at the top of `main`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(fmt::layer())
        .init();
}

/// Installs a test-friendly tracing subscriber exactly once.
///
/// Output goes through the test writer so it is captured per test by the harness. Safe to call
/// from every test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_TEST_FILTER.into()))
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
