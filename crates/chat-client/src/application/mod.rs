//! Application layer for the chat client.
//!
//! Nothing here opens sockets.  The session is generic over its byte
//! streams, and the estimator is a plain state machine fed with clock
//! readings, so both are tested without a network.
//!
//! - **`sync_estimator`** – Cristian's algorithm with exponential smoothing.
//! - **`session`** – Sends chat and time queries, routes relay lines.
//! - **`events`** – What the session tells the display.

pub mod events;
pub mod session;
pub mod sync_estimator;
