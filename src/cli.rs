//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, validate_config, ConfigError, RelayConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "mysql-relay")]
#[command(version, about = "Transparent MySQL wire-protocol relay", long_about = None)]
pub struct Cli {
    /// TOML configuration file; watched for changes while running
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Values given on the command line win over the config file, including
/// after a reload.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Client-facing listen address, e.g. 0.0.0.0:3336
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Upstream MySQL server, e.g. 127.0.0.1:3306
    #[arg(short, long)]
    pub upstream: Option<String>,

    /// Decode and log the server's initial handshake
    #[arg(long)]
    pub inspect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.address = upstream.clone();
        }
        if self.inspect {
            config.inspection.enabled = true;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

impl Cli {
    /// Load the config file (or defaults) and apply command line overrides.
    pub fn resolve_config(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };

        self.overrides.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;

        Ok(config)
    }
}
