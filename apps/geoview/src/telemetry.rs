use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Falls back to `info` when the filter does
/// not parse; a second call is a no-op.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
