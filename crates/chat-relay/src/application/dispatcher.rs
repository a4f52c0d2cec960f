//! RelayDispatcher: decides what happens to each line a connection sends.
//!
//! ```text
//! raw line ─► trim ─┬─ empty ─────────────► ignored
//!                   ├─ "TIME?" (any case) ─► reply TIME:<ms> to the sender only
//!                   └─ anything else ─────► stamp "[<ms>] <endpoint>: <text>"
//!                                           and broadcast to everyone else
//! ```
//!
//! The dispatcher performs no reads and owns no sockets.  The per-connection
//! read loop in `infrastructure::network` feeds it one line at a time and
//! awaits the result before reading the next, which keeps each sender's lines
//! in FIFO order at every receiver.

use std::sync::Arc;

use chat_core::protocol::messages::format_broadcast;
use chat_core::{ClientLine, TransportError};
use tracing::debug;

use crate::application::registry::{BroadcastReport, Connection, ConnectionRegistry};
use crate::application::time_oracle::TimeOracle;

/// What the dispatcher did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank line; nothing sent.
    Ignored,
    /// A time query was answered with this relay time.
    TimeReplied(i64),
    /// A chat line was stamped and fanned out.
    Broadcast(BroadcastReport),
}

pub struct RelayDispatcher {
    registry: Arc<ConnectionRegistry>,
    oracle: TimeOracle,
}

impl RelayDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, oracle: TimeOracle) -> Self {
        Self { registry, oracle }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Handles one received line from `conn`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the time reply cannot be written back
    /// to `conn`; the caller should close that connection.  Failures while
    /// broadcasting to *other* peers are absorbed by the registry.
    pub async fn dispatch(&self, conn: &Connection, raw: &str) -> Result<Dispatch, TransportError> {
        match ClientLine::parse(raw) {
            ClientLine::Empty => Ok(Dispatch::Ignored),
            ClientLine::TimeRequest => {
                let (ms, reply) = self.oracle.reply();
                conn.sink.send_line(&reply).await?;
                debug!("answered time query from {} with {ms}", conn.endpoint);
                Ok(Dispatch::TimeReplied(ms))
            }
            ClientLine::Chat(text) => {
                let recv_ms = self.oracle.current_time_ms();
                let stamped = format_broadcast(recv_ms, conn.endpoint, &text);
                let report = self.registry.broadcast(&stamped, conn.id).await;
                Ok(Dispatch::Broadcast(report))
            }
        }
    }
}
