//! Persistent storage: the overlay's TOML configuration.

pub mod config;

pub use config::{load_config, ConfigError, OverlayConfig};
