pub mod splitter;

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::sink::PayloadSink;
use splitter::{HeaderError, HeaderSplitter, Split};

/// Why a session ended early. Peer-side close is not an error (the pump
/// returns `Ok` for it), so everything here is worth a log line.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("{0}")]
    Header(#[from] HeaderError),
    #[error("{sink} sink write failed: {source}")]
    Sink {
        sink: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Owns one mirror connection from first byte to teardown: reads chunks,
/// splits off the control header, fans payload out to the sinks in order.
///
/// Generic over the read side so accepted sockets, the pull client, and
/// in-memory test streams all drive the same pump.
pub struct StreamSession<R> {
    peer: String,
    stream: R,
    splitter: HeaderSplitter,
    sinks: Vec<PayloadSink>,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> StreamSession<R> {
    pub fn new(
        peer: String,
        stream: R,
        sinks: Vec<PayloadSink>,
        chunk_size: usize,
        max_header_len: usize,
    ) -> Self {
        Self {
            peer,
            stream,
            splitter: HeaderSplitter::new(max_header_len),
            sinks,
            chunk_size,
        }
    }

    /// Drive the connection to completion. Teardown (kill the player,
    /// flush the capture file) runs on every exit path before the pump
    /// result is returned.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.pump().await;
        for sink in &mut self.sinks {
            sink.shutdown().await;
        }
        result
    }

    async fn pump(&mut self) -> Result<(), SessionError> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = self
                .stream
                .read(&mut buf)
                .await
                .map_err(SessionError::Read)?;
            if n == 0 {
                if !self.splitter.header_done() {
                    // Incomplete header: the buffered prefix was never
                    // forwarded anywhere and is dropped with the session
                    println!("🔌 [{}] closed before completing a header", self.peer);
                }
                return Ok(());
            }

            match self.splitter.feed(&buf[..n])? {
                Split::Buffering => {}
                Split::HeaderComplete { header, payload } => {
                    let text = String::from_utf8_lossy(&header);
                    println!("📜 [{}] control header: {}", self.peer, text.trim_end());
                    self.forward(payload).await?;
                }
                Split::Payload(chunk) => self.forward(chunk).await?,
            }
        }
    }

    async fn forward(&mut self, chunk: &[u8]) -> Result<(), SessionError> {
        if chunk.is_empty() {
            return Ok(());
        }
        for sink in &mut self.sinks {
            if let Err(source) = sink.write(chunk).await {
                return Err(SessionError::Sink {
                    sink: sink.label(),
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_HEADER_LEN;
    use tokio::io::AsyncWriteExt;

    async fn file_sink(path: &std::path::Path) -> PayloadSink {
        PayloadSink::open_file(path).await.unwrap()
    }

    #[tokio::test]
    async fn payload_split_mid_terminator_reaches_sink_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");
        let (mut client, server) = tokio::io::duplex(1024);

        let session = StreamSession::new(
            "test".to_string(),
            server,
            vec![file_sink(&path).await],
            1024,
            MAX_HEADER_LEN,
        );
        let running = tokio::spawn(session.run());

        client.write_all(b"CTRL\r\n\r").await.unwrap();
        client.write_all(b"\n\x00\x01\x02").await.unwrap();
        drop(client);

        running.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn incomplete_header_forwards_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");
        let (mut client, server) = tokio::io::duplex(1024);

        let session = StreamSession::new(
            "test".to_string(),
            server,
            vec![file_sink(&path).await],
            1024,
            MAX_HEADER_LEN,
        );
        let running = tokio::spawn(session.run());

        client
            .write_all(b"partial-header-no-terminator")
            .await
            .unwrap();
        drop(client);

        running.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[tokio::test]
    async fn payload_identity_across_many_small_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");
        let (mut client, server) = tokio::io::duplex(64);

        // Tiny read size to force chunking on the session side too
        let session = StreamSession::new(
            "test".to_string(),
            server,
            vec![file_sink(&path).await],
            7,
            MAX_HEADER_LEN,
        );
        let running = tokio::spawn(session.run());

        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        client.write_all(b"name: box\r\n\r\n").await.unwrap();
        for piece in payload.chunks(13) {
            client.write_all(piece).await.unwrap();
        }
        drop(client);

        running.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), payload);
    }

    #[tokio::test]
    async fn oversized_header_ends_session_with_header_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");
        let (mut client, server) = tokio::io::duplex(1024);

        let session = StreamSession::new(
            "test".to_string(),
            server,
            vec![file_sink(&path).await],
            64,
            128,
        );
        let running = tokio::spawn(session.run());

        let _ = client.write_all(&[b'h'; 512]).await;
        drop(client);

        let result = running.await.unwrap();
        assert!(matches!(result, Err(SessionError::Header(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sibling_session_unaffected_by_sink_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path_b = dir.path().join("b.raw");

        // Session A: player that never reads, so its pipe breaks
        let (mut client_a, server_a) = tokio::io::duplex(8 * 1024);
        let player = PayloadSink::spawn_player(&["false".to_string()]).unwrap();
        let session_a = StreamSession::new(
            "a".to_string(),
            server_a,
            vec![player],
            1024,
            MAX_HEADER_LEN,
        );
        let running_a = tokio::spawn(session_a.run());
        let writer_a = tokio::spawn(async move {
            let _ = client_a.write_all(b"A\r\n\r\n").await;
            let chunk = [0u8; 1024];
            for _ in 0..512 {
                if client_a.write_all(&chunk).await.is_err() {
                    break;
                }
            }
        });

        // Session B: healthy file sink, started alongside A
        let (mut client_b, server_b) = tokio::io::duplex(1024);
        let session_b = StreamSession::new(
            "b".to_string(),
            server_b,
            vec![file_sink(&path_b).await],
            1024,
            MAX_HEADER_LEN,
        );
        let running_b = tokio::spawn(session_b.run());
        client_b.write_all(b"B\r\n\r\n\xaa\xbb").await.unwrap();
        drop(client_b);

        assert!(running_a.await.unwrap().is_err());
        running_b.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path_b).unwrap(), b"\xaa\xbb");
        writer_a.abort();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sink_failure_is_fatal_but_teardown_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");
        let (mut client, server) = tokio::io::duplex(8 * 1024);

        // `false` exits without reading stdin, so the pipe breaks once
        // the kernel buffer fills
        let player = PayloadSink::spawn_player(&["false".to_string()]).unwrap();
        let session = StreamSession::new(
            "test".to_string(),
            server,
            vec![player, file_sink(&path).await],
            1024,
            MAX_HEADER_LEN,
        );
        let running = tokio::spawn(session.run());

        let writer = tokio::spawn(async move {
            let _ = client.write_all(b"H\r\n\r\n").await;
            let chunk = [0u8; 1024];
            for _ in 0..512 {
                if client.write_all(&chunk).await.is_err() {
                    break;
                }
            }
        });

        let result = running.await.unwrap();
        assert!(matches!(
            result,
            Err(SessionError::Sink { sink: "player", .. })
        ));
        writer.abort();
    }
}
