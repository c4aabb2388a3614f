use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset: crate events at `info`, dependencies at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "warn,blipcast=info";

fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global `tracing` subscriber, failing if one is already set.
pub fn try_init_logging() -> Result<(), TryInitError> {
    let formatting_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_target(true)
        .compact();

    Registry::default()
        .with(build_filter())
        .with(formatting_layer)
        .try_init()
}

/// Installs the global `tracing` subscriber. An already installed subscriber is kept.
pub fn init_logging() {
    if let Err(e) = try_init_logging() {
        tracing::debug!(target: "blipcast::logging", error = %e, "Global subscriber already set");
    }
}
