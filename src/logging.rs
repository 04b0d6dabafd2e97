//! Logging initialization.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize `env_logger` for the process. Safe to call repeatedly; later
/// calls are no-ops. Honors `RUST_LOG`, defaulting to `info`.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(cfg!(test))
            .try_init();
    });
}
