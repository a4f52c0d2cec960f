//! Protocol module containing the line framing layer and the message forms.

pub mod framing;
pub mod messages;

pub use framing::{LineDecoder, LineReader, LineWriter, TransportError};
pub use messages::*;
