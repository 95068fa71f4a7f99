use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use crate::protocol::{CapabilityDescriptor, DISCOVER_MESSAGE};

/// Answers UDP broadcast probes with the receiver's capability
/// descriptor. The descriptor is serialized once at construction, so
/// every reply during the process lifetime is byte-identical.
pub struct DiscoveryResponder {
    socket: UdpSocket,
    reply: Vec<u8>,
}

impl DiscoveryResponder {
    pub fn new(socket: UdpSocket, descriptor: &CapabilityDescriptor) -> Result<Self> {
        let reply = descriptor
            .to_json()
            .context("failed to serialize capability descriptor")?;
        Ok(Self { socket, reply })
    }

    /// Serve probes until the shutdown flag flips. The wait is a
    /// `select!` over the socket and the shutdown channel, so the host
    /// can always interrupt it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, src)) => self.handle_probe(&buf[..n], src).await,
                        // Transient (e.g. a previous reply bounced);
                        // the loop must outlive it
                        Err(e) => eprintln!("❌ discovery receive error: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        println!("📡 Discovery responder stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_probe(&self, payload: &[u8], src: SocketAddr) {
        if payload != DISCOVER_MESSAGE {
            println!(
                "📡 Ignoring datagram from {} ({} bytes, not a probe)",
                src,
                payload.len()
            );
            return;
        }
        println!("📡 Discovery probe from {}", src);
        if let Err(e) = reply_to(src, &self.reply).await {
            eprintln!("❌ Discovery reply to {} failed: {}", src, e);
        }
    }
}

/// Replies go out unicast to the probe's source on a fresh ephemeral
/// socket, never on the bound listening socket.
async fn reply_to(src: SocketAddr, reply: &[u8]) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(reply, src).await?;
    Ok(())
}

/// A receiver that answered a broadcast probe.
#[derive(Debug)]
pub struct DiscoveredReceiver {
    /// Source address of the reply datagram
    pub addr: SocketAddr,
    pub descriptor: CapabilityDescriptor,
}

/// Sender-side counterpart of the responder: broadcast one probe and
/// collect every descriptor reply that arrives before the deadline.
pub async fn probe_receivers(port: u16, wait: Duration) -> Result<Vec<DiscoveredReceiver>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind probe socket")?;
    socket
        .set_broadcast(true)
        .context("failed to enable broadcast on probe socket")?;
    socket
        .send_to(DISCOVER_MESSAGE, (Ipv4Addr::BROADCAST, port))
        .await
        .context("failed to send discovery probe")?;

    let mut found = Vec::new();
    let deadline = Instant::now() + wait;
    let mut buf = [0u8; 2048];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Err(_) => break, // deadline reached
            Ok(Err(e)) => return Err(e).context("probe receive failed"),
            Ok(Ok((n, addr))) => match serde_json::from_slice(&buf[..n]) {
                Ok(descriptor) => found.push(DiscoveredReceiver { addr, descriptor }),
                Err(e) => eprintln!("❌ Bad discovery reply from {}: {}", addr, e),
            },
        }
    }
    Ok(found)
}
