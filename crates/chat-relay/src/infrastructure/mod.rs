//! Infrastructure layer for the relay.
//!
//! Contains OS-facing adapters: the TCP listener and per-connection sockets,
//! and file-system storage for configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and `chat_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
