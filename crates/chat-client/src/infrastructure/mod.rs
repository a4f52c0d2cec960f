//! Infrastructure layer for the client.
//!
//! - **`network`** – TCP connection to the relay and the session's
//!   background tasks.
//! - **`storage`** – TOML configuration file.
//! - **`terminal`** – stdin/stdout front end.

pub mod network;
pub mod storage;
pub mod terminal;
