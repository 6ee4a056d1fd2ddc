//! Shared support for integration tests under `tests/`. Each test binary
//! compiles this module separately (the usual `tests/common/mod.rs`
//! convention), so `init_tracing()` lives here rather than behind the
//! library's own `#[cfg(test)]` module, which integration-test binaries never
//! link against.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing_subscriber::EnvFilter`-driven subscriber once per test
/// binary, honoring `RUST_LOG` (defaulting to `info` when unset).
#[allow(dead_code)]
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
