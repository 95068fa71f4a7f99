use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;

use crate::config::ReceiverConfig;
use crate::discovery::DiscoveryResponder;
use crate::sink::PayloadSink;
use crate::stream::StreamSession;

/// The receiver host: a TCP stream listener and a UDP discovery
/// responder sharing one immutable config and one shutdown channel.
pub struct ReceiverServer {
    config: Arc<ReceiverConfig>,
    listener: TcpListener,
    udp: UdpSocket,
}

impl ReceiverServer {
    /// Bind both listeners up front. Either port being taken is fatal:
    /// there is no retry; the operator resolves the conflict and
    /// restarts.
    pub async fn bind(config: ReceiverConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.stream_addr())
            .await
            .with_context(|| format!("failed to bind stream listener on {}", config.stream_addr()))?;
        let udp = UdpSocket::bind(config.discovery_addr())
            .await
            .with_context(|| format!("failed to bind discovery socket on {}", config.discovery_addr()))?;
        Ok(Self {
            config: Arc::new(config),
            listener,
            udp,
        })
    }

    pub fn stream_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn discovery_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp.local_addr()?)
    }

    /// Serve until Ctrl-C (or the discovery loop exits). The accept loop
    /// runs as a background task; discovery is the foreground loop.
    /// Shutdown stops both listeners and leaves in-flight sessions to
    /// their own natural teardown.
    pub async fn run(self) -> Result<()> {
        println!("📺 castview receiver — \"{}\"", self.config.name);
        println!("🎬 Mirror streams on: {}", self.listener.local_addr()?);
        println!("📡 Discovery on:      udp {}", self.udp.local_addr()?);
        match &self.config.player {
            Some(command) => println!("▶️  Player: {}", command.join(" ")),
            None => println!("▶️  Player: disabled"),
        }
        if let Some(path) = &self.config.save_path {
            println!("💾 Saving raw stream to: {}", path.display());
        }
        println!();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let acceptor = tokio::spawn(accept_loop(
            self.listener,
            self.config.clone(),
            shutdown_rx.clone(),
        ));

        let responder = DiscoveryResponder::new(self.udp, &self.config.descriptor())?;
        tokio::select! {
            result = responder.run(shutdown_rx) => result?,
            _ = tokio::signal::ctrl_c() => println!("\n👋 Shutting down"),
        }

        let _ = shutdown_tx.send(true);
        acceptor.await.context("acceptor task failed")??;
        Ok(())
    }
}

/// Accept connections until shutdown. Every connection gets its own
/// detached task and its own session state, so a stalled or failing
/// session never blocks the accept loop or its siblings.
async fn accept_loop(
    listener: TcpListener,
    config: Arc<ReceiverConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        println!("🎬 Sender connected: {}", peer);
                        let config = config.clone();
                        tokio::spawn(async move {
                            match serve_connection(stream, peer, &config).await {
                                Ok(()) => println!("🔌 [{}] session ended", peer),
                                Err(e) => eprintln!("❌ [{}] session error: {}", peer, e),
                            }
                        });
                    }
                    Err(e) => eprintln!("❌ Accept failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &ReceiverConfig,
) -> Result<()> {
    let sinks = build_sinks(config).await?;
    let session = StreamSession::new(
        peer.to_string(),
        stream,
        sinks,
        config.chunk_size,
        config.max_header_len,
    );
    session.run().await?;
    Ok(())
}

/// Sinks in configuration order: player first, then the capture file.
/// Shared with the pull-mode client.
pub async fn build_sinks(config: &ReceiverConfig) -> Result<Vec<PayloadSink>> {
    let mut sinks = Vec::new();
    if let Some(command) = &config.player {
        sinks.push(PayloadSink::spawn_player(command)?);
    }
    if let Some(path) = &config.save_path {
        sinks.push(PayloadSink::open_file(path).await?);
    }
    Ok(sinks)
}
