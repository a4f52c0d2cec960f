//! TOML-based configuration for the chat client.
//!
//! ```toml
//! [client]
//! host = "127.0.0.1"
//! port = 5000
//! name = "Anon"
//! log_level = "warn"
//!
//! [sync]
//! interval_ms = 5000
//! smoothing = 0.3
//!
//! [ui]
//! refresh_ms = 250
//! ```
//!
//! Every field is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::sync_estimator::{SyncConfig, SyncConfigError};
use crate::infrastructure::network::ConnectConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid sync settings: {0}")]
    Sync(#[from] SyncConfigError),

    #[error("display refresh period must be greater than zero")]
    ZeroRefresh,
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

/// `[client]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Display name prefixed to outgoing chat.
    #[serde(default = "default_name")]
    pub name: String,
    /// `tracing` level used when `RUST_LOG` is unset.  Logs go to stderr so
    /// a quiet default keeps the transcript readable.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

/// `[ui]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiSettings {
    /// How often the terminal drains session events and redraws the clock.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_name() -> String {
    "Anon".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_interval_ms() -> u64 {
    5000
}
fn default_smoothing() -> f64 {
    0.3
}
fn default_refresh_ms() -> u64 {
    250
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
        }
    }
}

impl AppConfig {
    /// Builds the connection settings, validating the sync parameters.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Sync`] if the smoothing factor or interval is invalid.
    pub fn to_connect_config(&self) -> Result<ConnectConfig, ConfigError> {
        let sync = SyncConfig::new(
            Duration::from_millis(self.sync.interval_ms),
            self.sync.smoothing,
        )?;
        Ok(ConnectConfig {
            host: self.client.host.clone(),
            port: self.client.port,
            name: self.client.name.clone(),
            sync,
        })
    }

    /// Display refresh period.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroRefresh`] if `refresh_ms` is 0.
    pub fn refresh_period(&self) -> Result<Duration, ConfigError> {
        match self.ui.refresh_ms {
            0 => Err(ConfigError::ZeroRefresh),
            ms => Ok(Duration::from_millis(ms)),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found", and
/// [`ConfigError::Parse`] if the TOML is malformed.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.client.host, "127.0.0.1");
        assert_eq!(cfg.client.port, 5000);
        assert_eq!(cfg.client.name, "Anon");
        assert_eq!(cfg.sync.interval_ms, 5000);
        assert_eq!(cfg.sync.smoothing, 0.3);
        assert_eq!(cfg.ui.refresh_ms, 250);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        // Arrange
        let toml_str = r#"
[client]
name = "zoe"

[sync]
smoothing = 0.5
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg.client.name, "zoe");
        assert_eq!(cfg.client.port, 5000);
        assert_eq!(cfg.sync.smoothing, 0.5);
        assert_eq!(cfg.sync.interval_ms, 5000);
        assert_eq!(cfg.ui, UiSettings::default());
    }

    #[test]
    fn test_to_connect_config_maps_fields() {
        let mut cfg = AppConfig::default();
        cfg.client.host = "relay.lan".to_string();
        cfg.sync.interval_ms = 1500;

        let conn = cfg.to_connect_config().unwrap();

        assert_eq!(conn.address(), "relay.lan:5000");
        assert_eq!(conn.name, "Anon");
        assert_eq!(conn.sync.interval, Duration::from_millis(1500));
        assert_eq!(conn.sync.smoothing, 0.3);
    }

    #[test]
    fn test_to_connect_config_rejects_bad_smoothing() {
        let mut cfg = AppConfig::default();
        cfg.sync.smoothing = 2.0;

        assert!(matches!(
            cfg.to_connect_config(),
            Err(ConfigError::Sync(SyncConfigError::InvalidSmoothing(_)))
        ));
    }

    #[test]
    fn test_refresh_period_rejects_zero() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.refresh_period().unwrap(), Duration::from_millis(250));

        cfg.ui.refresh_ms = 0;
        assert!(matches!(cfg.refresh_period(), Err(ConfigError::ZeroRefresh)));
    }

    #[test]
    fn test_save_then_load_round_trip_via_temp_dir() {
        let dir = std::env::temp_dir().join(format!("chat_client_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("client.toml");
        let mut cfg = AppConfig::default();
        cfg.client.name = "round-trip".to_string();

        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir()
            .join(format!("chat_client_missing_{}", uuid::Uuid::new_v4()))
            .join("client.toml");
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());
    }
}
