//! Per-connection TCP plumbing: the socket-backed [`LineSink`] and the read
//! loop that drives the dispatcher.
//!
//! # Connection lifecycle
//!
//! ```text
//! ACCEPTED ──► READING ──► (line) DISPATCH ──► READING ──► … ──► CLOSED
//! ```
//!
//! The loop leaves `READING` when the peer closes or resets the stream, when
//! a read or reply write fails, or when the registry evicts the connection
//! after a failed broadcast write.  In every case the connection is removed
//! from the registry and its socket is shut down.  None of this touches other
//! connections.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{LineReader, LineWriter, TransportError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::application::dispatcher::RelayDispatcher;
use crate::application::registry::{Connection, LineSink};

/// [`LineSink`] over the write half of an accepted TCP stream.
pub struct TcpLineSink {
    writer: LineWriter<OwnedWriteHalf>,
    closed: AtomicBool,
    closed_signal: Notify,
}

impl TcpLineSink {
    pub fn new(write_half: OwnedWriteHalf) -> Self {
        Self {
            writer: LineWriter::new(write_half),
            closed: AtomicBool::new(false),
            closed_signal: Notify::new(),
        }
    }

    /// Resolves once [`LineSink::close`] has been called.
    pub async fn closed(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        // `notify_one` stores a permit, so a close racing this await is not lost.
        self.closed_signal.notified().await;
    }

    /// Flushes and shuts down the socket's write side.
    pub async fn shutdown(&self) {
        self.writer.close().await;
    }
}

#[async_trait]
impl LineSink for TcpLineSink {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        self.writer.send_line(line).await
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.closed_signal.notify_one();
        }
    }
}

/// Runs the read loop for one registered connection until it closes.
///
/// `conn` must already be in the dispatcher's registry; it is removed on
/// exit.  `sink` is the same object as `conn.sink`, kept concretely so the
/// loop can wait on its close signal.
pub async fn run_connection(
    conn: Connection,
    sink: Arc<TcpLineSink>,
    read_half: OwnedReadHalf,
    dispatcher: Arc<RelayDispatcher>,
) {
    let peer = conn.endpoint;
    let mut reader = LineReader::new(read_half);

    loop {
        let received = tokio::select! {
            r = reader.receive_line() => r,
            _ = sink.closed() => {
                debug!("{peer}: evicted from registry; closing");
                break;
            }
        };

        match received {
            Ok(line) => {
                if let Err(e) = dispatcher.dispatch(&conn, &line).await {
                    warn!("{peer}: reply failed: {e}");
                    break;
                }
            }
            Err(TransportError::ConnectionClosed) => {
                debug!("{peer}: peer closed the stream");
                break;
            }
            Err(e) => {
                warn!("{peer}: read failed: {e}");
                break;
            }
        }
    }

    dispatcher.registry().remove(conn.id).await;
    sink.shutdown().await;
    info!("client disconnected: {peer}");
}
