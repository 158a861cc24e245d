use tracing_subscriber::{EnvFilter, fmt};

/// Installs a human-readable subscriber. `RUST_LOG` wins over `default_level`.
/// Repeat calls are no-ops.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();
}
