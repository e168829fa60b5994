//! Telemetry setup
//!
//! Configures structured logging with tracing and tracing-subscriber. The gate
//! itself only emits `tracing` events; installing a subscriber is up to the
//! embedding application, which may use this helper.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Build the filter used by [`init`]
///
/// `RUST_LOG` wins when set; otherwise the gate logs at `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("celery_health_gate={}", default_level)))
}

/// Initialize tracing subscriber for structured logging
///
/// This can only be called once per process. Subsequent calls are silently ignored.
/// If the application already installed a global subscriber, that one is kept
/// and the conflict is logged through it.
///
/// # Examples
///
/// ```no_run
/// celery_health_gate::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        if let Err(e) = tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(tracing_subscriber::fmt::layer())
            .try_init()
        {
            // Reaches whichever subscriber the embedding application installed
            tracing::warn!(error = %e, "Tracing subscriber already installed; keeping it");
        }
    });
}
