use std::io;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

/// A consumer of payload chunks. A session fans every chunk out to its
/// sinks in order; each sink is owned by exactly one session.
pub enum PayloadSink {
    /// External player process fed over a stdin pipe
    Player { child: Child, stdin: ChildStdin },
    /// Raw capture file
    File { file: File },
}

impl PayloadSink {
    /// Spawn the player with a piped stdin. stdout/stderr are discarded;
    /// nothing reads them, and a full pipe would stall the player.
    pub fn spawn_player(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().context("empty player command")?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn player '{}'", program))?;
        let stdin = child
            .stdin
            .take()
            .context("player child has no stdin pipe")?;
        Ok(Self::Player { child, stdin })
    }

    /// Open (truncate) the capture file in binary write mode.
    pub async fn open_file(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("failed to open capture file {}", path.display()))?;
        Ok(Self::File { file })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Player { .. } => "player",
            Self::File { .. } => "file",
        }
    }

    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Player { stdin, .. } => stdin.write_all(chunk).await,
            Self::File { file } => file.write_all(chunk).await,
        }
    }

    /// Release the sink. The player is killed outright (it reads stdin
    /// until EOF and has no shutdown handshake); the file is flushed.
    /// Failures here are ignored: teardown runs on error paths too.
    pub async fn shutdown(&mut self) {
        match self {
            Self::Player { child, .. } => {
                let _ = child.kill().await;
            }
            Self::File { file } => {
                let _ = file.flush().await;
            }
        }
    }
}
