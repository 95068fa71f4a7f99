use serde::{Deserialize, Serialize};

/// UDP probe payload senders broadcast to locate receivers.
/// Exact match, case-sensitive, no framing.
pub const DISCOVER_MESSAGE: &[u8] = b"hello";

/// Terminator of the one-time control header at the start of a mirror
/// stream. Everything after the first occurrence is raw media payload.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Default port for both the TCP stream listener and UDP discovery.
pub const DEFAULT_PORT: u16 = 53515;

/// Socket read size. Senders emit small encoder chunks, so a modest
/// buffer keeps latency low without hurting throughput.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Upper bound on control-header length. The header is a few short text
/// lines; a sender that exceeds this without a terminator is broken or
/// hostile and its connection is dropped before any forwarding.
pub const MAX_HEADER_LEN: usize = 8 * 1024;

/// Advertised stream resolution defaults (sender-side encoder defaults).
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// Request line sent by the pull-mode client to ask a sender to start
/// mirroring.
pub const MIRROR_REQUEST: &[u8] = b"mirror\n";

/// Static description of a receiver, sent as JSON in every discovery
/// reply. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    /// TCP port the receiver accepts mirror streams on
    pub port: u16,
    /// Human-readable receiver name shown in sender UIs
    pub name: String,
    /// Receiver identity (conventionally its network address)
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Video codec tag
    pub mirror: String,
    /// Audio codec tag
    pub audio: String,
    /// Subtitle MIME type
    pub subtitles: String,
    pub proxy_headers: bool,
    pub hls: bool,
    pub upsell: bool,
}

impl CapabilityDescriptor {
    /// Serialize for a discovery reply datagram.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
