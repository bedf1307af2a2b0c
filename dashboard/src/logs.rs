//! Logging for the dashboard client.

use tracing_subscriber::{EnvFilter, prelude::*};

const DEFAULT_FILTER: &str = "error,dashboard=debug,payloads=debug";

/// Initialize logging. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(true);

    // Also bridges `log` records, via the subscriber's tracing-log feature.
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!("Initialized logs");
    }
}
