//! Notifications from a chat session to whatever is displaying it.
//!
//! The session produces these on an unbounded channel, in order; the front
//! end drains the channel at its own pace.

use tokio::sync::mpsc;

/// One item for the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A line for the chat transcript.
    Line(String),
    /// New connection status text.
    Status(String),
    /// Smoothed clock offset changed.
    Offset(i64),
}

pub type EventSender = mpsc::UnboundedSender<UiEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// Creates the session-to-display channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Text shown in the transcript when the relay connection ends.
pub const DISCONNECTED_NOTICE: &str = "*** Disconnected from server ***";

/// `[SYNC] RTT=<rtt> ms, new_offset=<offset> ms`
pub fn format_sync_line(rtt_ms: i64, offset_ms: i64) -> String {
    format!("[SYNC] RTT={rtt_ms} ms, new_offset={offset_ms} ms")
}
