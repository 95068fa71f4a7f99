use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::protocol::{
    CapabilityDescriptor, DEFAULT_CHUNK_SIZE, DEFAULT_HEIGHT, DEFAULT_PORT, DEFAULT_WIDTH,
    MAX_HEADER_LEN,
};

/// Everything the receiver needs to run, resolved once from the CLI at
/// startup. Immutable afterwards; components get it by `Arc` and never
/// write back.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Address both listeners bind on
    pub bind: IpAddr,
    /// TCP port for incoming mirror streams
    pub port: u16,
    /// UDP port for discovery probes (defaults to `port`, independently
    /// configurable)
    pub discovery_port: u16,
    /// Display name advertised to senders
    pub name: String,
    /// Receiver identity advertised to senders
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Video codec tag advertised to senders
    pub mirror: String,
    /// Audio codec tag advertised to senders
    pub audio: String,
    /// Subtitle MIME type advertised to senders
    pub subtitles: String,
    /// Socket read size per chunk
    pub chunk_size: usize,
    /// Drop the connection if the control header grows past this without
    /// a terminator
    pub max_header_len: usize,
    /// Player command line, `None` to run without a player
    pub player: Option<Vec<String>>,
    /// Also append the raw payload to this file
    pub save_path: Option<PathBuf>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            discovery_port: DEFAULT_PORT,
            name: "castview".to_string(),
            id: "castview".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            mirror: "h264".to_string(),
            audio: "pcm".to_string(),
            subtitles: "text/vtt".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_header_len: MAX_HEADER_LEN,
            player: Some(default_player()),
            save_path: None,
        }
    }
}

/// `ffplay` reading from stdin, matching the sender's 25-30 fps encode
pub fn default_player() -> Vec<String> {
    ["ffplay", "-framerate", "30", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ReceiverConfig {
    pub fn stream_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn discovery_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.discovery_port)
    }

    /// Build the descriptor sent in discovery replies. Always advertises
    /// the TCP stream port, whatever the discovery port is.
    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            port: self.port,
            name: self.name.clone(),
            id: self.id.clone(),
            width: self.width,
            height: self.height,
            mirror: self.mirror.clone(),
            audio: self.audio.clone(),
            subtitles: self.subtitles.clone(),
            proxy_headers: true,
            hls: false,
            upsell: true,
        }
    }
}
