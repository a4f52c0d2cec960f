//! One chat session with the relay.
//!
//! `ClientSession` ties together the outgoing half of the line transport, the
//! clock-offset estimator and the event channel to the display.  It is
//! generic over the writer so tests can drive it with in-memory streams; the
//! TCP wiring lives in `infrastructure::network`.
//!
//! Three tasks use a session concurrently:
//!
//! - the read loop, which classifies every line from the relay,
//! - the sync timer, which periodically calls [`ClientSession::request_sync`],
//! - the front end, which calls [`ClientSession::send_chat`].
//!
//! The estimator sits behind a `tokio::sync::Mutex` so that a query start
//! and a reply completion never interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_core::protocol::framing::{LineReader, LineWriter, TransportError};
use chat_core::protocol::messages::{format_chat, ServerLine, TIME_REQUEST};
use chat_core::time::Clock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::events::{format_sync_line, EventSender, UiEvent, DISCONNECTED_NOTICE};
use super::sync_estimator::{SyncConfig, SyncEstimator, SyncSample};

/// Errors surfaced to the front end.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session has ended; nothing more can be sent.
    #[error("not connected to the relay")]
    NotConnected,

    /// The TCP connection to the relay could not be opened.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A send failed for a reason other than the connection being gone.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        if e.is_closed() {
            ClientError::NotConnected
        } else {
            ClientError::Transport(e)
        }
    }
}

/// `Connected to <addr> as <name>`
pub fn connected_status(addr: &str, name: &str) -> String {
    format!("Connected to {addr} as {name}")
}

/// State of one connection to the relay.
pub struct ClientSession<W> {
    name: String,
    writer: LineWriter<W>,
    estimator: Mutex<SyncEstimator>,
    clock: Arc<dyn Clock>,
    events: EventSender,
    connected: AtomicBool,
}

impl<W: AsyncWrite + Unpin + Send> ClientSession<W> {
    pub fn new(
        name: impl Into<String>,
        writer: W,
        sync: SyncConfig,
        clock: Arc<dyn Clock>,
        events: EventSender,
    ) -> Self {
        Self {
            name: name.into(),
            writer: LineWriter::new(writer),
            estimator: Mutex::new(SyncEstimator::new(sync)),
            clock,
            events,
            connected: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Sends a chat line and echoes it locally.
    ///
    /// Input is trimmed; blank input is ignored.  The line goes out as
    /// `[HH:MM:SS] <name>: <text>` using the local clock.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] once the session has ended.
    /// - [`ClientError::Transport`] if the text contains a line break or the
    ///   write fails.
    pub async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let line = format_chat(self.clock.now_ms(), &self.name, text);
        self.writer.send_line(&line).await?;
        self.emit(UiEvent::Line(line));
        Ok(())
    }

    /// Sends `TIME?` unless a query is already outstanding.
    ///
    /// Returns `Ok(true)` if a query was sent.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] once the session has ended, or the
    /// transport error from the write.
    pub async fn request_sync(&self) -> Result<bool, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let started = {
            let mut est = self.estimator.lock().await;
            est.begin(self.clock.now_ms())
        };
        if !started {
            return Ok(false);
        }

        self.writer.send_line(TIME_REQUEST).await?;
        debug!("time query sent");
        Ok(true)
    }

    /// Routes one line received from the relay.
    ///
    /// Time replies feed the estimator; anything else goes to the transcript
    /// unchanged.  Malformed time replies are logged and dropped.
    pub async fn handle_line(&self, raw: &str) {
        match ServerLine::parse(raw) {
            Ok(ServerLine::TimeReply(server_ms)) => {
                let sample = {
                    let mut est = self.estimator.lock().await;
                    est.complete(server_ms, self.clock.now_ms())
                };
                if let Some(sample) = sample {
                    self.report_sample(sample);
                }
            }
            Ok(ServerLine::Chat(line)) => self.emit(UiEvent::Line(line)),
            Err(e) => warn!("dropping reply: {e}"),
        }
    }

    /// Reads lines until the relay goes away, then reports the disconnect.
    pub async fn run_read_loop<R>(&self, mut reader: LineReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match reader.receive_line().await {
                Ok(line) => self.handle_line(&line).await,
                Err(e) if e.is_closed() => {
                    info!("relay closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("read error from relay: {e}");
                    break;
                }
            }
        }
        self.shutdown().await;
    }

    /// Ends the session: refuses further sends and closes the writer.
    ///
    /// The disconnect notice is emitted once, however many times this is
    /// called.
    pub async fn shutdown(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.emit(UiEvent::Status("Disconnected".to_string()));
            self.emit(UiEvent::Line(DISCONNECTED_NOTICE.to_string()));
        }
        self.writer.close().await;
    }

    /// Current smoothed offset (relay minus local), in milliseconds.
    pub async fn offset_ms(&self) -> i64 {
        self.estimator.lock().await.offset_ms()
    }

    /// Local time corrected by the offset.
    pub async fn synced_time_ms(&self) -> i64 {
        let now = self.clock.now_ms();
        self.estimator.lock().await.synced_time_ms(now)
    }

    /// `true` while a time query is outstanding.
    pub async fn is_sync_pending(&self) -> bool {
        self.estimator.lock().await.is_awaiting()
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        // The front end may already have gone away.
        let _ = self.events.send(event);
    }

    fn report_sample(&self, sample: SyncSample) {
        debug!(
            "sync: rtt={} raw={} offset={}",
            sample.rtt_ms, sample.raw_offset_ms, sample.offset_ms
        );
        self.emit(UiEvent::Line(format_sync_line(sample.rtt_ms, sample.offset_ms)));
        self.emit(UiEvent::Offset(sample.offset_ms));
    }
}
