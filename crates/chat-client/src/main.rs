//! Relay-Chat client: entry point.
//!
//! # Usage
//!
//! ```text
//! chat-client [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file (missing file = defaults)
//!   --host <HOST>            Relay host            [default: 127.0.0.1]
//!   --port <PORT>            Relay port            [default: 5000]
//!   --name <NAME>            Display name          [default: Anon]
//!   --sync-interval <SECS>   Seconds between time queries [default: 5]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable    | Description   |
//! |-------------|---------------|
//! | `CHAT_HOST` | Relay host    |
//! | `CHAT_PORT` | Relay port    |
//! | `CHAT_NAME` | Display name  |
//! | `RUST_LOG`  | Log filter    |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chat_client::application::events::event_channel;
use chat_client::infrastructure::network::connect;
use chat_client::infrastructure::storage::config::{load_config, AppConfig};
use chat_client::infrastructure::terminal;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relay-Chat terminal client with clock synchronisation.
#[derive(Debug, Parser)]
#[command(name = "chat-client", about = "Chat through a relay and track its clock", version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relay host name or IP address.
    #[arg(long, env = "CHAT_HOST")]
    host: Option<String>,

    /// Relay TCP port.
    #[arg(long, env = "CHAT_PORT")]
    port: Option<u16>,

    /// Display name shown to other users.
    #[arg(long, env = "CHAT_NAME")]
    name: Option<String>,

    /// Seconds between clock-sync queries.
    #[arg(long)]
    sync_interval: Option<u64>,
}

impl Cli {
    /// Loads the config file (if any) and applies CLI overrides on top.
    fn effective_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(host) = &self.host {
            cfg.client.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.client.port = port;
        }
        if let Some(name) = &self.name {
            cfg.client.name = name.clone();
        }
        if let Some(secs) = self.sync_interval {
            cfg.sync.interval_ms = secs.saturating_mul(1000);
        }
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = cli.effective_config()?;

    // Logs go to stderr so they do not mix with the transcript on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.client.log_level)),
        )
        .init();

    let connect_config = app_config
        .to_connect_config()
        .context("invalid client configuration")?;
    let refresh = app_config.refresh_period()?;

    let (tx, rx) = event_channel();
    let handle = connect(&connect_config, tx)
        .await
        .context("connecting to relay")?;

    terminal::run(handle, rx, refresh)
        .await
        .context("terminal output failed")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
