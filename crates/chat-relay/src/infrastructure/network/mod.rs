//! Network infrastructure for the relay.
//!
//! # Sub-modules
//!
//! - **`server`** – Binds the TCP listener, accepts clients, registers them
//!   and spawns one task per connection.
//!
//! - **`connection`** – The socket-backed `LineSink` and the per-connection
//!   read loop that feeds the dispatcher and cleans up on close.

pub mod connection;
pub mod server;

pub use server::{RelayConfig, RelayError, RelayServer};
