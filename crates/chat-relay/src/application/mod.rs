//! Application layer use cases for the relay.
//!
//! Nothing in here opens a socket.  Connections are represented by the
//! [`registry::LineSink`] trait, so every use case can be unit-tested with
//! in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`registry`**    – The set of live connections and the broadcast
//!   fan-out with partial-failure eviction.
//!
//! - **`dispatcher`**  – Classifies each received line as a time query, a
//!   chat message, or noise, and routes it.
//!
//! - **`time_oracle`** – Reads the relay clock for `TIME:` replies and
//!   broadcast stamps.

pub mod dispatcher;
pub mod registry;
pub mod time_oracle;
