//! Relay-Chat relay: entry point.
//!
//! # Usage
//!
//! ```text
//! chat-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML config file (missing file = defaults)
//!   --bind <IP>                Listener address      [default: 127.0.0.1]
//!   --port <PORT>              Listener port         [default: 5000]
//!   --write-timeout-ms <MS>    Broadcast write limit [default: 5000]
//!   --init-config              Write the effective config to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Description       |
//! |---------------------|-------------------|
//! | `CHAT_RELAY_BIND`   | Listener address  |
//! | `CHAT_RELAY_PORT`   | Listener port     |
//! | `RUST_LOG`          | Log filter        |
//!
//! Precedence, highest first: CLI flag, environment variable, config file,
//! built-in default.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::infrastructure::network::{RelayConfig, RelayServer};
use chat_relay::infrastructure::storage::config::{load_config, save_config, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relay-Chat relay server.
///
/// Forwards each chat line to every other connected client and answers
/// `TIME?` queries with the relay's wall clock.
#[derive(Debug, Parser)]
#[command(name = "chat-relay", about = "Line-oriented chat relay with a time oracle", version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "CHAT_RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "CHAT_RELAY_PORT")]
    port: Option<u16>,

    /// Broadcast write timeout in milliseconds.
    #[arg(long)]
    write_timeout_ms: Option<u64>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long, requires = "config")]
    init_config: bool,
}

impl Cli {
    /// Loads the config file (if any) and applies CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn effective_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(bind) = &self.bind {
            cfg.relay.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            cfg.relay.port = port;
        }
        if let Some(ms) = self.write_timeout_ms {
            cfg.relay.write_timeout_ms = ms;
        }
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Parse CLI arguments and merge them over the config file.
/// 2. Initialise `tracing`; `RUST_LOG` wins over the configured level.
/// 3. Bind the listener.  A bind failure exits non-zero.
/// 4. Serve until Ctrl+C clears the running flag.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = cli.effective_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.relay.log_level)),
        )
        .init();

    if cli.init_config {
        if let Some(path) = &cli.config {
            save_config(path, &app_config)
                .with_context(|| format!("writing config to {}", path.display()))?;
            info!("wrote config to {}", path.display());
        }
        return Ok(());
    }

    let relay_config: RelayConfig = app_config
        .to_relay_config()
        .context("invalid relay configuration")?;

    let server = RelayServer::bind(&relay_config)
        .await
        .context("starting relay")?;

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    server.serve(running).await?;

    info!("relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
