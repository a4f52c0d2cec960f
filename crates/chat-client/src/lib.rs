//! chat-client library entry point.
//!
//! # What does the client do? (for beginners)
//!
//! The client connects to a relay, sends whatever the user types as chat and
//! prints what other users send.  In the background it keeps an estimate of
//! how far its own clock is from the relay's:
//!
//! 1. Every few seconds it sends `TIME?`.
//! 2. The relay answers `TIME:<ms>` with its wall clock.
//! 3. The client assumes the answer took half the round trip to arrive,
//!    works out the offset, and smooths it into its running estimate.
//!
//! The front end shows both the local clock and the corrected ("synced")
//! clock side by side.

/// Application layer: session, clock sync, display events.
pub mod application;

/// Infrastructure layer: TCP connection, config storage, terminal.
pub mod infrastructure;
