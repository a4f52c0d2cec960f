//! Integration tests for the line transport over real loopback TCP sockets.
//!
//! These cover what the in-memory unit tests cannot: the kernel splitting and
//! coalescing writes, and several tasks writing to one socket at once.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::{LineReader, LineWriter, TransportError};
use tokio::net::{TcpListener, TcpStream};

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

/// Concurrent writers sharing one `LineWriter` must never interleave frames,
/// and each writer's lines must arrive in the order it sent them.
#[tokio::test]
async fn test_concurrent_writers_do_not_interleave_frames() {
    // Arrange
    const WRITERS: usize = 8;
    const LINES: usize = 200;
    let (a, b) = socket_pair().await;
    let writer = Arc::new(LineWriter::new(a));
    let mut reader = LineReader::new(b);

    // Act: writers run in the background while this task drains the socket,
    // otherwise the kernel buffer fills and the writers stall.
    let driver = tokio::spawn(async move {
        let mut tasks = Vec::new();
        for w in 0..WRITERS {
            let writer = Arc::clone(&writer);
            tasks.push(tokio::spawn(async move {
                for i in 0..LINES {
                    // Pad so a single frame is larger than a typical small write.
                    let line = format!("w{w}:{i}:{}", "x".repeat(300));
                    writer.send_line(&line).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        writer.close().await;
    });

    // Assert
    let mut next_expected: HashMap<usize, usize> = HashMap::new();
    let mut total = 0;
    loop {
        match reader.receive_line().await {
            Ok(line) => {
                let mut parts = line.splitn(3, ':');
                let w: usize = parts.next().unwrap()[1..].parse().unwrap();
                let i: usize = parts.next().unwrap().parse().unwrap();
                assert_eq!(parts.next().unwrap().len(), 300, "frame was corrupted");
                let expected = next_expected.entry(w).or_insert(0);
                assert_eq!(i, *expected, "writer {w} lines arrived out of order");
                *expected += 1;
                total += 1;
            }
            Err(TransportError::ConnectionClosed) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(total, WRITERS * LINES);
    driver.await.unwrap();
}

#[tokio::test]
async fn test_peer_close_without_newline_yields_connection_closed() {
    use tokio::io::AsyncWriteExt;

    let (mut a, b) = socket_pair().await;
    let mut reader = LineReader::new(b);

    a.write_all(b"complete\nincomplete").await.unwrap();
    a.shutdown().await.unwrap();
    drop(a);

    assert_eq!(reader.receive_line().await.unwrap(), "complete");
    assert!(matches!(
        reader.receive_line().await,
        Err(TransportError::ConnectionClosed)
    ));
}
