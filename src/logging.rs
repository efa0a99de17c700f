//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over `--log-level` when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter for the given default level.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "seatrace={level},seatrace_registry={level},info",
            level = log_level
        )
        .into()
    })
}

/// Install the global subscriber. Call once from `main`.
pub fn init(log_level: &str, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(log_level));
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
