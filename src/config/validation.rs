//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0, ports present)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: {value:?} is not one of {allowed:?}")]
    NotAllowed {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

/// Check a parsed configuration, collecting every error found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_connections",
        });
    }

    if !is_host_port(&config.upstream.address) {
        errors.push(ValidationError::InvalidAddress {
            field: "upstream.address",
            value: config.upstream.address.clone(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.connect_secs",
        });
    }

    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.handshake_secs",
        });
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::NotAllowed {
            field: "observability.log_level",
            value: observability.log_level.clone(),
            allowed: LOG_LEVELS,
        });
    }

    if !LOG_FORMATS.contains(&observability.log_format.as_str()) {
        errors.push(ValidationError::NotAllowed {
            field: "observability.log_format",
            value: observability.log_format.clone(),
            allowed: LOG_FORMATS,
        });
    }

    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn upstream_accepts_host_names() {
        let mut config = RelayConfig::default();
        config.upstream.address = "db.internal:3306".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "localhost".to_string();
        config.listener.max_connections = 0;
        config.upstream.address = "127.0.0.1".to_string();
        config.timeouts.connect_secs = 0;
        config.timeouts.handshake_secs = 0;
        config.observability.log_level = "verbose".to_string();
        config.observability.log_format = "xml".to_string();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 8);
        assert!(errors.contains(&ValidationError::Zero {
            field: "timeouts.handshake_secs"
        }));
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = RelayConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
