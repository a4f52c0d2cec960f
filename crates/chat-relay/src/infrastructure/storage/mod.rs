//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the relay's TOML settings and can write the
//! effective settings back out as a starting template.

pub mod config;
