mod cli;
mod client;
mod config;
mod discovery;
mod protocol;
mod server;
mod sink;
mod stream;

use std::time::Duration;

use anyhow::Result;
use cli::{Cli, Commands};
use config::ReceiverConfig;
use server::ReceiverServer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Serve {
            port,
            discovery_port,
            bind,
            name,
            id,
            width,
            height,
            chunk_size,
            sinks,
        } => {
            let config = ReceiverConfig {
                bind,
                port,
                discovery_port: discovery_port.unwrap_or(port),
                id: id.unwrap_or_else(|| name.clone()),
                name,
                width,
                height,
                chunk_size,
                player: sinks.player_command(),
                save_path: sinks.save,
                ..Default::default()
            };
            let server = ReceiverServer::bind(config).await?;
            server.run().await?;
        }
        Commands::Pull { addr, sinks } => {
            let config = ReceiverConfig {
                player: sinks.player_command(),
                save_path: sinks.save,
                ..Default::default()
            };
            client::pull(&addr, &config).await?;
        }
        Commands::Discover { port, timeout } => {
            discover(port, timeout).await?;
        }
    }

    Ok(())
}

async fn discover(port: u16, timeout_secs: u64) -> Result<()> {
    println!("📡 Probing for receivers on UDP port {}...", port);
    let receivers = discovery::probe_receivers(port, Duration::from_secs(timeout_secs)).await?;

    if receivers.is_empty() {
        println!("🔍 No receivers answered");
        return Ok(());
    }
    for found in &receivers {
        let d = &found.descriptor;
        println!(
            "📺 {} — {}x{} {}/{} on tcp {}, id: {} (reply from {})",
            d.name, d.width, d.height, d.mirror, d.audio, d.port, d.id, found.addr
        );
    }
    Ok(())
}
