use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ReceiverConfig;
use crate::protocol::MIRROR_REQUEST;
use crate::server::build_sinks;
use crate::stream::StreamSession;

/// Pull mode: instead of waiting for a sender to connect, dial a sender
/// that exposes its own mirror port, ask it to start, then handle the
/// socket exactly like an accepted connection: same splitter, same
/// sinks, same teardown.
pub async fn pull(addr: &str, config: &ReceiverConfig) -> Result<()> {
    println!("🔌 Connecting to sender: {}", addr);
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    stream
        .write_all(MIRROR_REQUEST)
        .await
        .context("failed to send mirror request")?;
    println!("🎬 Mirror requested, streaming...");

    let sinks = build_sinks(config).await?;
    let session = StreamSession::new(
        addr.to_string(),
        stream,
        sinks,
        config.chunk_size,
        config.max_header_len,
    );
    session.run().await?;
    println!("🔌 Stream ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn pull_requests_mirror_and_captures_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.raw");

        // Stand-in sender: expects the request line, then streams
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sender = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 7];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, b"mirror\n");
            socket.write_all(b"CTRL\r\n\r").await.unwrap();
            socket.write_all(b"\n\x00\x01\x02").await.unwrap();
        });

        let config = ReceiverConfig {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            player: None,
            save_path: Some(path.clone()),
            ..Default::default()
        };
        pull(&addr.to_string(), &config).await.unwrap();

        sender.await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x00\x01\x02");
    }
}
