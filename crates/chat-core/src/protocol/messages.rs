//! Line forms exchanged between clients and the relay.
//!
//! | Direction            | Line form                          | Meaning                     |
//! |----------------------|------------------------------------|-----------------------------|
//! | client → relay       | `TIME?` (any case)                 | ask for relay wall-clock    |
//! | relay → requester    | `TIME:<ms>`                        | relay time, ms since epoch  |
//! | client → relay       | any other non-empty text           | chat message                |
//! | relay → other peers  | `[<ms>] <endpoint>: <text>`        | relay-stamped chat line     |
//!
//! Parsing is split by side: the relay classifies what clients send with
//! [`ClientLine`], and the client classifies what the relay sends with
//! [`ServerLine`].

use std::net::SocketAddr;

use thiserror::Error;

use crate::time::format_hms;

/// Control token a client sends to request the relay's time.
pub const TIME_REQUEST: &str = "TIME?";

/// Prefix of the relay's reply to [`TIME_REQUEST`].
pub const TIME_REPLY_PREFIX: &str = "TIME:";

/// Errors raised while interpreting a received line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text after `TIME:` is not a decimal integer.
    #[error("malformed sync reply payload: {0:?}")]
    MalformedSyncReply(String),
}

/// A line received by the relay, after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// Blank or whitespace-only; not dispatched.
    Empty,
    /// The `TIME?` control query.
    TimeRequest,
    /// Chat text to broadcast.
    Chat(String),
}

impl ClientLine {
    pub fn parse(raw: &str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            ClientLine::Empty
        } else if line.eq_ignore_ascii_case(TIME_REQUEST) {
            ClientLine::TimeRequest
        } else {
            ClientLine::Chat(line.to_string())
        }
    }
}

/// A line received by a client, after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// `TIME:<ms>` carrying the relay's clock.
    TimeReply(i64),
    /// Anything else; shown verbatim.
    Chat(String),
}

impl ServerLine {
    /// Classifies a line from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedSyncReply`] when the line starts with
    /// `TIME:` but the rest is not an integer.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let line = raw.trim();
        match line.strip_prefix(TIME_REPLY_PREFIX) {
            Some(payload) => payload
                .trim()
                .parse::<i64>()
                .map(ServerLine::TimeReply)
                .map_err(|_| ProtocolError::MalformedSyncReply(payload.to_string())),
            None => Ok(ServerLine::Chat(line.to_string())),
        }
    }
}

/// `TIME:<ms>`
pub fn format_time_reply(server_ms: i64) -> String {
    format!("{TIME_REPLY_PREFIX}{server_ms}")
}

/// Relay-stamped broadcast form: `[<ms>] <endpoint>: <text>`.
pub fn format_broadcast(recv_ms: i64, endpoint: SocketAddr, text: &str) -> String {
    format!("[{recv_ms}] {endpoint}: {text}")
}

/// Client-side outgoing chat form: `[HH:MM:SS] <name>: <text>`.
///
/// The stamp is the sender's local clock and only serves the local echo; the
/// relay adds its own receive-time stamp in front when broadcasting.
pub fn format_chat(local_ms: i64, name: &str, text: &str) -> String {
    format!("[{}] {name}: {text}", format_hms(local_ms))
}
