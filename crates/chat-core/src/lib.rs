//! # chat-core
//!
//! Shared library for Relay-Chat containing the newline-framed transport,
//! the text wire protocol, and the clock abstraction used for time sync.
//!
//! This crate is used by both the relay and the client applications.
//! It owns no sockets: the transport is generic over any
//! `tokio::io::AsyncRead` / `AsyncWrite`, so tests can drive it with
//! in-memory streams.
//!
//! # Architecture overview (for beginners)
//!
//! Relay-Chat is a small real-time chat service.  A central *relay* accepts
//! many TCP connections and re-sends every chat line it receives to all the
//! other connected *clients*.  Clients also ask the relay for its wall-clock
//! time every few seconds and use Cristian's algorithm to estimate how far
//! their own clock is from the relay's.
//!
//! This crate (`chat-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every message is a
//!   single UTF-8 line terminated by `\n`.  The `framing` module turns a raw
//!   byte stream into lines and back; the `messages` module classifies lines
//!   as time queries, time replies, or chat text.
//!
//! - **`time`** – A small [`Clock`] trait so the relay's time oracle and the
//!   client's sync estimator can be tested with a fake clock.

pub mod protocol;
pub mod time;

// Re-export the most-used types at the crate root so callers can write
// `chat_core::LineReader` instead of `chat_core::protocol::framing::LineReader`.
pub use protocol::framing::{LineDecoder, LineReader, LineWriter, TransportError};
pub use protocol::messages::{ClientLine, ProtocolError, ServerLine};
pub use time::{Clock, SystemClock};
