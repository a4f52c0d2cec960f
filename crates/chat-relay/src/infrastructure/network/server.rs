//! Relay TCP server: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming client connections.
//! 3. Registering each connection with the [`ConnectionRegistry`] before its
//!    first line is read.
//! 4. Spawning one Tokio task per connection that runs
//!    [`run_connection`](super::connection::run_connection).
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Isolation
//!
//! Each connection runs in its own task.  A connection that stalls, errors or
//! disconnects only ends its own task; the accept loop keeps accepting and the
//! other tasks keep reading.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info};

use crate::application::dispatcher::RelayDispatcher;
use crate::application::registry::{Connection, ConnectionId, ConnectionRegistry, DEFAULT_WRITE_TIMEOUT};
use crate::application::time_oracle::TimeOracle;
use crate::infrastructure::network::connection::{run_connection, TcpLineSink};

/// How often the accept loop wakes to check the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Error type for the relay network layer.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime settings for the relay server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,
    /// Upper bound on one broadcast write before the target is evicted.
    pub write_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// A bound, not yet serving, relay.
pub struct RelayServer {
    listener: TcpListener,
    dispatcher: Arc<RelayDispatcher>,
}

impl RelayServer {
    /// Binds the listener and builds the registry and dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BindFailed`] if the address is in use or not
    /// bindable.
    pub async fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::bind_with_oracle(config, TimeOracle::default()).await
    }

    /// Like [`bind`](Self::bind) with an explicit time source.
    pub async fn bind_with_oracle(
        config: &RelayConfig,
        oracle: TimeOracle,
    ) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| RelayError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;
        let registry = Arc::new(ConnectionRegistry::new(config.write_timeout));
        let dispatcher = Arc::new(RelayDispatcher::new(registry, oracle));
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the live connection set.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(self.dispatcher.registry())
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Connections already accepted keep running after this returns; they
    /// end when their peers disconnect or the runtime shuts down.
    pub async fn serve(self, running: Arc<AtomicBool>) -> Result<(), RelayError> {
        info!("relay listening on {}", self.local_addr()?);

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    self.admit(stream, peer).await;
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // No connection within the poll interval.
                }
            }
        }

        Ok(())
    }

    /// Registers an accepted stream and spawns its read loop.
    async fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        info!("client connected: {peer}");

        let (read_half, write_half) = stream.into_split();
        let sink = Arc::new(TcpLineSink::new(write_half));
        let conn = Connection {
            id: ConnectionId::new(),
            endpoint: peer,
            sink: sink.clone(),
        };
        self.dispatcher.registry().add(conn.clone()).await;

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(run_connection(conn, sink, read_half, dispatcher));
    }
}
