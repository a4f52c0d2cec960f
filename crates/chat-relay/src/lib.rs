//! chat-relay library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the relay do? (for beginners)
//!
//! The relay is the hub every chat client connects to.  For each line a
//! client sends, it either:
//!
//! 1. answers a `TIME?` query with `TIME:<ms>`, to that client only, or
//! 2. stamps the line with its own receive time and the sender's
//!    `address:port`, and forwards it to every *other* connected client.
//!
//! A client whose socket fails during a forward is dropped without disturbing
//! delivery to anyone else.

/// Application layer: registry, dispatcher, time oracle.
pub mod application;

/// Infrastructure layer: TCP server and configuration storage.
pub mod infrastructure;
