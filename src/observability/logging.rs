//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick the log level from `RUST_LOG`, falling back to the config
//! - Pretty output for terminals, JSON for log aggregation

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!("mysql_relay={}", config.log_level)
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let json = config.log_format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(fmt::layer))
        .with(json.then(|| fmt::layer().json()))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_to_crate() {
        let mut config = ObservabilityConfig::default();
        config.log_level = "debug".to_string();
        assert_eq!(default_directive(&config), "mysql_relay=debug");
    }
}
