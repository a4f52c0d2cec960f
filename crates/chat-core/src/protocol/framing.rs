//! Newline-delimited framing over an async byte stream.
//!
//! Wire format:
//! ```text
//! <utf-8 text without '\n'>\n
//! ```
//! One frame per logical message.  There is no length prefix and no escaping:
//! the newline *is* the frame boundary.
//!
//! # Why a buffer is needed (for beginners)
//!
//! TCP is a stream protocol.  A single `read()` may return half a line, or
//! the tail of one line followed by two more complete ones.  [`LineDecoder`]
//! accumulates bytes across reads and only hands out a line once its `\n`
//! has arrived, so consumers never see a partial line.
//!
//! # Writers
//!
//! [`LineWriter`] guards the write half with a `tokio::sync::Mutex` and writes
//! each frame with a single `write_all` while holding it.  Two tasks that
//! broadcast to the same connection therefore never interleave bytes of
//! their frames.  If a write fails part-way, the writer is dropped so that no
//! later frame lands after a truncated one.

use std::borrow::Cow;
use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Size of each `read()` into the decoder.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Errors produced by the line transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed or reset the stream.  Any unterminated trailing bytes
    /// were discarded.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The caller tried to send text containing a newline, which would split
    /// into two frames on the wire.
    #[error("line contains an embedded newline")]
    EmbeddedNewline,

    /// Any other I/O failure on the underlying stream.
    #[error("connection I/O error: {0}")]
    Io(#[source] io::Error),
}

impl TransportError {
    /// Returns `true` when the error means the stream is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed)
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
            _ => TransportError::Io(e),
        }
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Accumulates raw bytes and splits them into complete lines.
///
/// The decoder is pure (no I/O) so it can be unit-tested and benchmarked
/// without a socket.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched without finding a delimiter.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of bytes as received from the stream.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete line, without its delimiter.
    ///
    /// Returns `None` until a `\n` has been pushed.  Invalid UTF-8 is
    /// replaced with U+FFFD rather than failing the line.
    pub fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == DELIMITER) else {
            self.scanned = self.buf.len();
            return None;
        };
        let pos = self.scanned + offset;
        let frame: Vec<u8> = self.buf.drain(..=pos).collect();
        self.scanned = 0;
        Some(decode_lossy(&frame[..pos]))
    }

    /// Number of buffered bytes that do not yet form a complete line.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drops any buffered partial line and returns how many bytes were lost.
    pub fn discard(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.clear();
        self.scanned = 0;
        n
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => s.to_owned(),
        Cow::Owned(s) => {
            debug!("replaced invalid UTF-8 in {}-byte line", bytes.len());
            s
        }
    }
}

/// Builds the on-wire frame for `text`.
///
/// Trailing newlines are stripped first so callers may pass either `"hi"` or
/// `"hi\n"`; exactly one delimiter is appended.
///
/// # Errors
///
/// Returns [`TransportError::EmbeddedNewline`] if `text` still contains a
/// newline after stripping.
pub fn encode_frame(text: &str) -> Result<Vec<u8>, TransportError> {
    let body = text.trim_end_matches('\n');
    if body.contains('\n') {
        return Err(TransportError::EmbeddedNewline);
    }
    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.extend_from_slice(body.as_bytes());
    frame.push(DELIMITER);
    Ok(frame)
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Read side of the line transport.
pub struct LineReader<R> {
    inner: R,
    decoder: LineDecoder,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Waits for the next complete line.
    ///
    /// Calling this repeatedly yields every line in arrival order.  Lines
    /// already buffered from an earlier read are returned without touching
    /// the stream.
    ///
    /// Cancel-safe: if the future is dropped while waiting on the stream, no
    /// received bytes are lost.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] on EOF (discarding any
    /// unterminated residue) or reset, and [`TransportError::Io`] for other
    /// read failures.
    pub async fn receive_line(&mut self) -> Result<String, TransportError> {
        loop {
            if let Some(line) = self.decoder.next_line() {
                return Ok(line);
            }

            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                let lost = self.decoder.discard();
                if lost > 0 {
                    debug!("stream closed with {lost} unterminated byte(s); discarded");
                }
                return Err(TransportError::ConnectionClosed);
            }
            self.decoder.push(&self.chunk[..n]);
        }
    }

    /// Bytes received but not yet returned as a line.
    pub fn pending_len(&self) -> usize {
        self.decoder.pending_len()
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Write side of the line transport.
///
/// Shareable by reference: every method takes `&self`, so wrap it in an
/// `Arc` to let several tasks write to the same connection.
pub struct LineWriter<W> {
    inner: Mutex<Option<W>>,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Writes `text` followed by exactly one newline.
    ///
    /// The whole frame is written while the writer lock is held.
    ///
    /// # Errors
    ///
    /// - [`TransportError::EmbeddedNewline`] if `text` spans several lines.
    /// - [`TransportError::ConnectionClosed`] if the writer was closed, or
    ///   the peer reset the stream.
    /// - [`TransportError::Io`] for other write failures.  The writer is
    ///   closed afterwards.
    pub async fn send_line(&self, text: &str) -> Result<(), TransportError> {
        let frame = encode_frame(text)?;

        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;

        let result = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            // A partially written frame leaves the stream unusable.
            guard.take();
            return Err(e.into());
        }
        Ok(())
    }

    /// Shuts the stream down and drops it.  Idempotent.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("shutdown on close failed: {e}");
            }
        }
    }

    /// Returns `true` once [`close`](Self::close) was called or a write failed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    // ── LineDecoder ───────────────────────────────────────────────────────────

    #[test]
    fn test_decoder_returns_none_without_delimiter() {
        let mut dec = LineDecoder::new();
        dec.push(b"partial");
        assert_eq!(dec.next_line(), None);
        assert_eq!(dec.pending_len(), 7);
    }

    #[test]
    fn test_decoder_splits_multiple_lines_in_one_chunk() {
        // Arrange
        let mut dec = LineDecoder::new();

        // Act
        dec.push(b"one\ntwo\nthr");

        // Assert
        assert_eq!(dec.next_line().as_deref(), Some("one"));
        assert_eq!(dec.next_line().as_deref(), Some("two"));
        assert_eq!(dec.next_line(), None);
        assert_eq!(dec.pending_len(), 3);
    }

    #[test]
    fn test_decoder_joins_line_split_across_chunks() {
        let mut dec = LineDecoder::new();
        dec.push(b"AB");
        assert_eq!(dec.next_line(), None);
        dec.push(b"CD");
        assert_eq!(dec.next_line(), None);
        dec.push(b"\nE\n");
        assert_eq!(dec.next_line().as_deref(), Some("ABCD"));
        assert_eq!(dec.next_line().as_deref(), Some("E"));
        assert_eq!(dec.next_line(), None);
    }

    #[test]
    fn test_decoder_replaces_invalid_utf8() {
        let mut dec = LineDecoder::new();
        dec.push(b"caf\xff\n");
        assert_eq!(dec.next_line().as_deref(), Some("caf\u{FFFD}"));
    }

    #[test]
    fn test_decoder_keeps_empty_lines_for_the_consumer() {
        // Empty frames are real frames; filtering them is the dispatcher's job.
        let mut dec = LineDecoder::new();
        dec.push(b"\n");
        assert_eq!(dec.next_line().as_deref(), Some(""));
    }

    #[test]
    fn test_decoder_discard_drops_residue() {
        let mut dec = LineDecoder::new();
        dec.push(b"dangling");
        assert_eq!(dec.discard(), 8);
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn test_decoder_searches_only_new_bytes_of_a_long_line() {
        // Arrange: a 64 KiB line delivered in 4 KiB chunks
        let mut dec = LineDecoder::new();
        let chunk = vec![b'x'; READ_CHUNK_SIZE];

        // Act / Assert: each failed search advances the scanned mark
        for i in 1..=16 {
            dec.push(&chunk);
            assert_eq!(dec.next_line(), None);
            assert_eq!(dec.scanned, i * READ_CHUNK_SIZE);
        }
        dec.push(b"\nnext");

        let line = dec.next_line().expect("complete line");
        assert_eq!(line.len(), 16 * READ_CHUNK_SIZE);
        assert_eq!(dec.scanned, 0);
    }

    #[test]
    fn test_decoder_rescans_residue_after_a_line_is_taken() {
        let mut dec = LineDecoder::new();
        dec.push(b"a\nb");

        assert_eq!(dec.next_line().as_deref(), Some("a"));
        assert_eq!(dec.next_line(), None);
        assert_eq!(dec.scanned, 1);

        dec.push(b"c\nd\n");
        assert_eq!(dec.next_line().as_deref(), Some("bc"));
        assert_eq!(dec.next_line().as_deref(), Some("d"));
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn test_decoder_discard_resets_scan_position() {
        let mut dec = LineDecoder::new();
        dec.push(b"partial");
        assert_eq!(dec.next_line(), None);

        dec.discard();
        dec.push(b"\n");

        assert_eq!(dec.next_line().as_deref(), Some(""));
    }

    // ── encode_frame ──────────────────────────────────────────────────────────

    #[test]
    fn test_encode_frame_appends_single_newline() {
        assert_eq!(encode_frame("hi").unwrap(), b"hi\n");
        assert_eq!(encode_frame("hi\n\n").unwrap(), b"hi\n");
    }

    #[test]
    fn test_encode_frame_rejects_embedded_newline() {
        assert!(matches!(
            encode_frame("a\nb"),
            Err(TransportError::EmbeddedNewline)
        ));
    }

    // ── LineReader ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reader_yields_lines_across_three_chunks() {
        // Arrange
        let mock = Builder::new()
            .read(b"AB")
            .read(b"C\n")
            .read(b"D\nE\n")
            .build();
        let mut reader = LineReader::new(mock);

        // Act / Assert
        assert_eq!(reader.receive_line().await.unwrap(), "ABC");
        assert_eq!(reader.receive_line().await.unwrap(), "D");
        assert_eq!(reader.receive_line().await.unwrap(), "E");
        assert!(reader.receive_line().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_reader_discards_unterminated_tail_on_eof() {
        let mock = Builder::new().read(b"hello\nwor").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.receive_line().await.unwrap(), "hello");
        let err = reader.receive_line().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
        assert_eq!(reader.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_reader_maps_reset_to_connection_closed() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = LineReader::new(mock);

        assert!(reader.receive_line().await.unwrap_err().is_closed());
    }

    // ── LineWriter ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_writer_sends_one_frame_per_line() {
        let mock = Builder::new().write(b"hello\n").write(b"world\n").build();
        let writer = LineWriter::new(mock);

        writer.send_line("hello").await.unwrap();
        writer.send_line("world\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_fails_after_close() {
        let mock = Builder::new().build();
        let writer = LineWriter::new(mock);

        writer.close().await;

        assert!(writer.is_closed().await);
        assert!(writer.send_line("late").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_writer_closes_itself_after_write_error() {
        // Arrange
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let writer = LineWriter::new(mock);

        // Act
        let first = writer.send_line("x").await;

        // Assert
        assert!(first.unwrap_err().is_closed());
        assert!(writer.is_closed().await);
    }

    #[tokio::test]
    async fn test_writer_round_trips_through_duplex_pipe() {
        let (a, b) = tokio::io::duplex(64);
        let writer = LineWriter::new(a);
        let mut reader = LineReader::new(b);

        writer.send_line("ping").await.unwrap();
        writer.send_line("pong").await.unwrap();

        assert_eq!(reader.receive_line().await.unwrap(), "ping");
        assert_eq!(reader.receive_line().await.unwrap(), "pong");
    }
}
