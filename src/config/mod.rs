//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via ArcSwap with the accept loop
//!
//! On file change:
//!     watcher.rs sees an event in the file's directory
//!     → waits for the burst to settle, skips an empty file
//!     → loader.rs parses, command line overrides re-applied
//!     → validation.rs validates
//!     → atomic swap of Arc<RelayConfig>
//!     → connections accepted afterwards use the new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The listener address is fixed for the life of the process

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    InspectionConfig, ListenerConfig, ObservabilityConfig, RelayConfig, ShutdownConfig, TimeoutConfig,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
