use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_HEIGHT, DEFAULT_PORT, DEFAULT_WIDTH};

#[derive(Parser)]
#[command(name = "castview")]
#[command(about = "📺 Screen-cast receiver — discover, receive and play mirror streams", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the receiver (stream listener + discovery responder)
    Serve {
        /// TCP port to accept mirror streams on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// UDP discovery port (defaults to the stream port)
        #[arg(long)]
        discovery_port: Option<u16>,

        /// Address to bind both listeners on
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: IpAddr,

        /// Receiver name shown in sender UIs
        #[arg(short, long, default_value = "castview")]
        name: String,

        /// Receiver id advertised to senders (defaults to the name)
        #[arg(long)]
        id: Option<String>,

        /// Advertised stream width
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: u32,

        /// Advertised stream height
        #[arg(long, default_value_t = DEFAULT_HEIGHT)]
        height: u32,

        /// Socket read size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[command(flatten)]
        sinks: SinkArgs,
    },

    /// Pull a mirror stream from a sender instead of listening
    Pull {
        /// Sender address, host:port
        addr: String,

        #[command(flatten)]
        sinks: SinkArgs,
    },

    /// Broadcast a probe and list receivers on the local network
    Discover {
        /// Discovery port to probe
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Seconds to wait for replies
        #[arg(short, long, default_value_t = 3)]
        timeout: u64,
    },
}

/// Where the payload goes. Shared by `serve` and `pull`.
#[derive(Args)]
pub struct SinkArgs {
    /// Player command line, fed the raw stream on stdin
    #[arg(long, default_value = "ffplay -framerate 30 -")]
    pub player: String,

    /// Don't spawn a player
    #[arg(long)]
    pub no_player: bool,

    /// Also save the raw stream to this file
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

impl SinkArgs {
    /// Player command split into argv form, `None` with `--no-player`.
    pub fn player_command(&self) -> Option<Vec<String>> {
        if self.no_player {
            return None;
        }
        Some(self.player.split_whitespace().map(str::to_string).collect())
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
