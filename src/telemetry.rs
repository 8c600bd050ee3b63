//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console logging with an env-filter override.
///
/// Defaults to `info` globally with `debug` for this crate; set `RUST_LOG`
/// to change it. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,yums_core=debug"));

    let console_layer = fmt::layer().with_target(true);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_reentrant() {
        init();
        init();
    }
}
