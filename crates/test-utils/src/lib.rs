pub mod builders;
pub mod fake_executor;
pub mod fake_kind;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use saltdag::logging::LOG_ENV;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for one whole run in a test: graph build, scheduling and
/// every retry backoff the scenario scripts.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a test-captured subscriber once per test binary.
///
/// Reads the same `SALTDAG_LOG` directive the binary uses, so
/// `SALTDAG_LOG=saltdag::engine=debug cargo test -- --nocapture` shows the
/// scheduler's decisions. Falls back to `RUST_LOG`, then to `saltdag=info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("saltdag=info"));

        // Ignore the error when another harness already set a global default.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await a run, failing the test if it outlives [`RUN_TIMEOUT`]; a hung
/// scheduler shows up as a panic instead of a stuck `cargo test`.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_TIMEOUT, f).await {
        Ok(out) => out,
        Err(_) => panic!("run did not settle within {RUN_TIMEOUT:?}; scheduler likely stalled"),
    }
}
