//! Logging setup on top of `log` and `env_logger`

pub use log::{debug, error, info, trace, warn};

/// Initialize logging, honouring `RUST_LOG` and defaulting to `info`
pub fn init() {
    init_with_level("info");
}

/// Initialize logging with `default_level` unless `RUST_LOG` overrides it
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}
