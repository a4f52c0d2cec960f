//! Line-based terminal front end.
//!
//! Each line typed on stdin is sent as chat.  On every refresh tick the
//! pending session events are drained: transcript lines are printed as they
//! are, and status or offset changes print a clock line
//!
//! ```text
//! Local: 14:03:07  Synced: 14:03:08  Offset: 1185 ms
//! ```
//!
//! End of input (Ctrl+D) closes the session.

use std::io::{self, Write};
use std::time::Duration;

use chat_core::time::{format_hms, now_ms};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use crate::application::events::{EventReceiver, UiEvent};
use crate::application::session::ClientError;
use crate::infrastructure::network::SessionHandle;

/// `Local: HH:MM:SS  Synced: HH:MM:SS  Offset: N ms`
pub fn format_clock_line(local_ms: i64, synced_ms: i64, offset_ms: i64) -> String {
    format!(
        "Local: {}  Synced: {}  Offset: {offset_ms} ms",
        format_hms(local_ms),
        format_hms(synced_ms)
    )
}

/// Turns session events into printable lines.
#[derive(Debug, Default)]
pub struct Renderer {
    status: String,
    offset_ms: i64,
}

impl Renderer {
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Renders one batch of events.
    ///
    /// `local_ms` is the local clock at render time; the synced clock is
    /// derived from it and the latest offset seen.
    pub fn render(&mut self, events: impl IntoIterator<Item = UiEvent>, local_ms: i64) -> Vec<String> {
        let mut out = Vec::new();
        let mut clock_dirty = false;

        for event in events {
            match event {
                UiEvent::Line(text) => out.push(text),
                UiEvent::Status(text) => {
                    out.push(format!("-- {text} --"));
                    self.status = text;
                    clock_dirty = true;
                }
                UiEvent::Offset(ms) => {
                    self.offset_ms = ms;
                    clock_dirty = true;
                }
            }
        }

        if clock_dirty {
            out.push(format_clock_line(
                local_ms,
                local_ms + self.offset_ms,
                self.offset_ms,
            ));
        }
        out
    }
}

fn drain(events: &mut EventReceiver) -> Vec<UiEvent> {
    let mut batch = Vec::new();
    while let Ok(ev) = events.try_recv() {
        batch.push(ev);
    }
    batch
}

fn print_lines(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Runs the terminal until stdin reaches end of input, then closes the session.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub async fn run(handle: SessionHandle, mut events: EventReceiver, refresh: Duration) -> io::Result<()> {
    let mut renderer = Renderer::default();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = input.next_line() => match line {
                Ok(Some(text)) => match handle.send_chat(&text).await {
                    Ok(()) => {}
                    Err(ClientError::NotConnected) => {
                        print_lines(&mut io::stdout(), &["(not connected; message dropped)".to_string()])?;
                    }
                    Err(e) => warn!("send failed: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            },
            _ = ticker.tick() => {
                let lines = renderer.render(drain(&mut events), now_ms());
                print_lines(&mut io::stdout(), &lines)?;
            }
        }
    }

    handle.close().await;
    let lines = renderer.render(drain(&mut events), now_ms());
    print_lines(&mut io::stdout(), &lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_line_format() {
        let line = format_clock_line(0, 0, -42);
        assert!(line.starts_with("Local: "));
        assert!(line.contains("  Synced: "));
        assert!(line.ends_with("  Offset: -42 ms"));
    }

    #[test]
    fn test_lines_pass_through_without_clock_line() {
        let mut r = Renderer::default();

        let out = r.render(vec![UiEvent::Line("a".into()), UiEvent::Line("b".into())], 0);

        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_status_and_offset_produce_one_clock_line() {
        // Arrange
        let mut r = Renderer::default();
        let events = vec![
            UiEvent::Status("Connected to 127.0.0.1:5000 as Anon".into()),
            UiEvent::Line("[SYNC] RTT=4 ms, new_offset=12 ms".into()),
            UiEvent::Offset(12),
        ];

        // Act
        let out = r.render(events, 1_000_000);

        // Assert
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "-- Connected to 127.0.0.1:5000 as Anon --");
        assert_eq!(out[2], format_clock_line(1_000_000, 1_000_012, 12));
        assert_eq!(r.status(), "Connected to 127.0.0.1:5000 as Anon");
    }

    #[test]
    fn test_offset_persists_across_batches() {
        let mut r = Renderer::default();
        r.render(vec![UiEvent::Offset(-300)], 0);

        let out = r.render(vec![UiEvent::Status("Disconnected".into())], 5_000);

        assert_eq!(out[1], format_clock_line(5_000, 4_700, -300));
    }

    #[test]
    fn test_print_lines_writes_each_line() {
        let mut buf = Vec::new();

        print_lines(&mut buf, &["x".to_string(), "y".to_string()]).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "x\ny\n");
    }
}
