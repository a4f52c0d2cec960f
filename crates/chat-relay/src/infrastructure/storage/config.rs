//! TOML-based configuration for the relay.
//!
//! The file is optional.  When `--config <path>` names a file that does not
//! exist yet, the defaults below apply; `--init-config` writes them out.
//!
//! ```toml
//! [relay]
//! bind_address = "127.0.0.1"
//! port = 5000
//! write_timeout_ms = 5000
//! log_level = "info"
//! ```
//!
//! Fields annotated with `#[serde(default = "some_fn")]` fall back to
//! `some_fn()` when absent, so partial files are valid.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::RelayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    /// `write_timeout_ms` is 0.
    #[error("write timeout must be greater than zero")]
    ZeroWriteTimeout,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelaySettings,
}

/// `[relay]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySettings {
    /// IP address to bind the listener to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Broadcast write timeout in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            write_timeout_ms: default_write_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Converts the file settings into the server's runtime config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` does not parse,
    /// or [`ConfigError::ZeroWriteTimeout`] if `write_timeout_ms` is 0.
    pub fn to_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        if self.relay.write_timeout_ms == 0 {
            return Err(ConfigError::ZeroWriteTimeout);
        }
        let ip: IpAddr = self
            .relay
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.relay.bind_address.clone()))?;
        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.relay.port),
            write_timeout: Duration::from_millis(self.relay.write_timeout_ms),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
