//! Network infrastructure for the client.
//!
//! Opens the TCP connection to the relay and starts the two background
//! tasks every session needs:
//!
//! - the **read task**, which runs [`ClientSession::run_read_loop`] on the
//!   read half of the socket,
//! - the **sync task**, which calls [`ClientSession::request_sync`] once per
//!   sync interval.
//!
//! Both tasks are owned by the returned [`SessionHandle`].  No reconnect is
//! attempted; when the relay goes away the session reports it and stays
//! disconnected.

use std::sync::Arc;
use std::time::Duration;

use chat_core::protocol::framing::LineReader;
use chat_core::time::{Clock, SystemClock};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::events::{EventSender, UiEvent};
use crate::application::session::{connected_status, ClientError, ClientSession};
use crate::application::sync_estimator::SyncConfig;

/// Where to connect and how to identify.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectConfig {
    /// Relay host name or IP address.
    pub host: String,
    pub port: u16,
    /// Display name prefixed to outgoing chat.
    pub name: String,
    pub sync: SyncConfig,
}

impl ConnectConfig {
    /// `host:port`, as shown in the status line.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            name: "Anon".to_string(),
            sync: SyncConfig::default(),
        }
    }
}

/// The TCP-backed session type.
pub type TcpSession = ClientSession<OwnedWriteHalf>;

/// A live session and its background tasks.
///
/// Dropping the handle does not stop the tasks; call [`close`](Self::close).
pub struct SessionHandle {
    session: Arc<TcpSession>,
    read_task: JoinHandle<()>,
    sync_task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn session(&self) -> &Arc<TcpSession> {
        &self.session
    }

    /// See [`ClientSession::send_chat`].
    pub async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        self.session.send_chat(text).await
    }

    pub async fn synced_time_ms(&self) -> i64 {
        self.session.synced_time_ms().await
    }

    pub async fn offset_ms(&self) -> i64 {
        self.session.offset_ms().await
    }

    /// `true` once the relay has gone away or the handle was closed.
    pub fn is_finished(&self) -> bool {
        self.read_task.is_finished()
    }

    /// Stops both tasks and closes the socket.
    pub async fn close(self) {
        self.sync_task.abort();
        self.read_task.abort();
        self.session.shutdown().await;
        info!("session closed");
    }
}

/// Connects to the relay using the system clock.
///
/// # Errors
///
/// [`ClientError::ConnectFailed`] if the TCP connection cannot be opened.
pub async fn connect(config: &ConnectConfig, events: EventSender) -> Result<SessionHandle, ClientError> {
    connect_with_clock(config, Arc::new(SystemClock), events).await
}

/// Like [`connect`] with an explicit clock.
pub async fn connect_with_clock(
    config: &ConnectConfig,
    clock: Arc<dyn Clock>,
    events: EventSender,
) -> Result<SessionHandle, ClientError> {
    let addr = config.address();
    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(|source| ClientError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;
    info!("connected to relay at {addr} as {}", config.name);

    let (read_half, write_half) = stream.into_split();
    let session = Arc::new(ClientSession::new(
        config.name.clone(),
        write_half,
        config.sync,
        clock,
        events,
    ));
    session.emit(UiEvent::Status(connected_status(&addr, &config.name)));

    let reader_session = Arc::clone(&session);
    let read_task = tokio::spawn(async move {
        reader_session.run_read_loop(LineReader::new(read_half)).await;
    });

    let sync_task = tokio::spawn(run_sync_timer(Arc::clone(&session), config.sync.interval));

    Ok(SessionHandle {
        session,
        read_task,
        sync_task,
    })
}

/// Issues a time query every `period`, starting one period after connect.
async fn run_sync_timer(session: Arc<TcpSession>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match session.request_sync().await {
            Ok(true) => {}
            Ok(false) => debug!("previous time query still outstanding"),
            Err(ClientError::NotConnected) => break,
            Err(e) => {
                warn!("time query failed: {e}");
                break;
            }
        }
    }
    debug!("sync timer stopped");
}
