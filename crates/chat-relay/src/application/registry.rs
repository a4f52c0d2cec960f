//! ConnectionRegistry: the relay's set of live connections and the broadcast
//! fan-out over them.
//!
//! The registry is the only state shared between connection tasks.  Every
//! membership change and every snapshot taken for a broadcast happens under
//! one `tokio::sync::Mutex`, so adds and removes are never lost and a
//! broadcast never iterates a half-updated map.
//!
//! # Broadcast without holding the lock (for beginners)
//!
//! Writing to a socket can be slow: a peer with a full receive window stalls
//! the writer.  If the membership lock were held for the whole fan-out, one
//! slow peer would also stall every `add` and `remove` on the relay.  So
//! `broadcast` works in three steps:
//!
//! ```text
//! lock ─► copy the target list ─► unlock
//!         write to all targets concurrently, each bounded by a timeout
//! lock ─► evict the targets whose write failed ─► unlock
//! ```
//!
//! A failed write never aborts the broadcast: every healthy peer still gets
//! the line, and the failing peer is removed afterwards.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_core::TransportError;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default upper bound on a single broadcast write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque identifier for one accepted connection.
///
/// The peer's `address:port` is not used as the key because the OS may reuse
/// it as soon as the old socket is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Output side of a connection, as seen by the registry.
///
/// The TCP implementation lives in `infrastructure::network`; tests use
/// recording doubles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Writes one complete line to the peer.
    async fn send_line(&self, line: &str) -> Result<(), TransportError>;

    /// Marks the sink closed.  Later `send_line` calls must fail, and the
    /// connection's read loop is told to stop.  Must not block.
    fn close(&self);
}

/// A registered connection.
#[derive(Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// Peer `address:port`, used to stamp broadcast lines.
    pub endpoint: SocketAddr,
    pub sink: Arc<dyn LineSink>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Why a broadcast write to one target failed.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),
}

/// Outcome of one [`ConnectionRegistry::broadcast`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Targets that accepted the line.
    pub delivered: usize,
    /// Targets whose write failed and that are no longer registered.
    pub evicted: Vec<ConnectionId>,
}

/// In-memory registry of live connections.
///
/// Shared between connection tasks as `Arc<ConnectionRegistry>`.
pub struct ConnectionRegistry {
    members: Mutex<HashMap<ConnectionId, Connection>>,
    write_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

impl ConnectionRegistry {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            write_timeout,
        }
    }

    /// Registers a connection.
    ///
    /// Returns `false` (and changes nothing) if the id is already present.
    pub async fn add(&self, conn: Connection) -> bool {
        let mut members = self.members.lock().await;
        if members.contains_key(&conn.id) {
            return false;
        }
        members.insert(conn.id, conn);
        true
    }

    /// Unregisters a connection and closes its sink.
    ///
    /// Returns `false` if it was not registered (e.g. already evicted).
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut members = self.members.lock().await;
        match members.remove(&id) {
            Some(conn) => {
                conn.sink.close();
                true
            }
            None => false,
        }
    }

    /// Sends `line` to every registered connection except `excluding`.
    ///
    /// Writes run concurrently without the membership lock held; each is
    /// bounded by the registry's write timeout.  Targets that fail are
    /// evicted once all writes have finished.
    pub async fn broadcast(&self, line: &str, excluding: ConnectionId) -> BroadcastReport {
        let targets: Vec<Connection> = {
            let members = self.members.lock().await;
            members
                .values()
                .filter(|c| c.id != excluding)
                .cloned()
                .collect()
        };

        let limit = self.write_timeout;
        let outcomes = join_all(targets.iter().map(|conn| async move {
            let outcome = match tokio::time::timeout(limit, conn.sink.send_line(line)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(WriteFailure::Transport(e)),
                Err(_) => Err(WriteFailure::TimedOut(limit)),
            };
            (conn, outcome)
        }))
        .await;

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (conn, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("broadcast to {} failed: {e}; evicting", conn.endpoint);
                    failed.push(conn.id);
                }
            }
        }

        if !failed.is_empty() {
            let mut members = self.members.lock().await;
            for id in failed {
                // A concurrent remove may already have taken it out.
                if let Some(conn) = members.remove(&id) {
                    conn.sink.close();
                    report.evicted.push(id);
                }
            }
        }

        debug!(
            "broadcast delivered to {}, evicted {}",
            report.delivered,
            report.evicted.len()
        );
        report
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Endpoints of all registered connections, in no particular order.
    pub async fn endpoints(&self) -> Vec<SocketAddr> {
        self.members
            .lock()
            .await
            .values()
            .map(|c| c.endpoint)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
