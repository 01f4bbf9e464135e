//! TOML configuration for the overlay process.
//!
//! Read from the path given with `--config` / `PROJMAP_CONFIG`, or else from
//! the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ProjMap\overlay.toml`
//! - Linux:    `$XDG_CONFIG_HOME/projmap/overlay.toml` or `~/.config/projmap/overlay.toml`
//! - macOS:    `~/Library/Application Support/ProjMap/overlay.toml`
//!
//! A missing file is not an error: every field has a default.
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [calibration]
//! calibrate_without_size = false
//!
//! [pointer]
//! rect_size = 1.2
//!
//! [protocol]
//! inbound_capacity = 64
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use projmap_core::CalibrationPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OverlayConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"projmap_overlay=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    /// Calibrate against the unit square when four markers arrive before any
    /// `SetInitSize`.
    #[serde(default)]
    pub calibrate_without_size: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PointerConfig {
    /// Logical side length of a rectangle placed by a click in draw mode.
    #[serde(default = "default_rect_size")]
    pub rect_size: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Capacity of the channel between the stdin reader and the session.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_rect_size() -> f64 {
    1.2
}
fn default_inbound_capacity() -> usize {
    64
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            rect_size: default_rect_size(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl OverlayConfig {
    pub fn calibration_policy(&self) -> CalibrationPolicy {
        CalibrationPolicy {
            calibrate_without_size: self.calibration.calibrate_without_size,
        }
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero channel capacity or a
    /// non-positive pointer rectangle size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.inbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "protocol.inbound_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.pointer.rect_size.is_finite() && self.pointer.rect_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pointer.rect_size must be a positive number, got {}",
                self.pointer.rect_size
            )));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("overlay.toml"))
}

/// Loads the configuration from `explicit`, or from [`config_file_path`] when
/// no path is given.  Returns defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(explicit: Option<&Path>) -> Result<OverlayConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    load_config_from(&path)
}

/// Loads the configuration from `path`, returning defaults if it is absent.
///
/// # Errors
///
/// As for [`load_config`].
pub fn load_config_from(path: &Path) -> Result<OverlayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: OverlayConfig = toml::from_str(&content)?;
            debug!(path = %path.display(), "config loaded");
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            Ok(OverlayConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config base directory including the `ProjMap`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ProjMap"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("projmap"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ProjMap")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
