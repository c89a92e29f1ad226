//! # jp-daemon
//!
//! Standalone jpfiddle bridge over stdio.
//!
//! Speaks the host protocol as newline-delimited JSON: one `HostMessage`
//! per stdin line, one `GuestMessage` per stdout line. Runs on the
//! in-memory file store, which makes it a faithful stand-in for the
//! embedded guest during host development — same messages, same ordering,
//! no workspace required.
//!
//! ## Usage
//!
//! ```text
//! $ jp-daemon
//! {"type":"jpfiddle-extension-ready"}
//! > {"type":"set-fiddle-id","fiddleId":"abc"}
//! > {"type":"set-files","files":[{"path":"main.py","content":"print(1)"}]}
//! {"type":"file-saved","path":"main.py","content":"print(1)"}
//! {"type":"files","files":[{"path":"main.py","content":"print(1)"}]}
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use jp_bridge::{session, BridgeConfig, LoggingCommands, MemoryStore};
use jp_protocol::{GuestMessage, HostMessage};

/// jpfiddle guest bridge on stdio.
#[derive(Parser)]
#[command(name = "jp-daemon", about = "jpfiddle guest bridge on stdio")]
struct Cli {
    /// Delay between workspace-command availability checks, in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,

    /// Maximum availability checks before abandoning a workspace command.
    #[arg(long, default_value_t = 100)]
    max_poll_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they don't interfere with the protocol on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("jp_bridge=info".parse()?)
                .add_directive("jp_daemon=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig {
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
        max_poll_attempts: cli.max_poll_attempts,
    };

    tracing::info!("starting jpfiddle bridge on stdio");

    let store = Arc::new(MemoryStore::new());
    let session::BridgeHandle {
        host_tx,
        mut guest_rx,
    } = session::spawn(store, Arc::new(LoggingCommands), config);

    // Outbound: guest messages to stdout, one JSON object per line.
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = guest_rx.recv().await {
            if let Some(line) = encode_guest_line(&message) {
                if stdout.write_all(line.as_bytes()).await.is_err()
                    || stdout.write_all(b"\n").await.is_err()
                    || stdout.flush().await.is_err()
                {
                    break;
                }
            }
        }
    });

    // Inbound: host messages from stdin. Undecodable lines are skipped;
    // unknown-but-valid message types are ignored by the controller.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(message) = decode_host_line(&line) {
            debug!(?message, "host message received");
            if host_tx.send(message).is_err() {
                break;
            }
        }
    }

    // Stdin closed: drop the inbound side so the bridge drains and stops.
    drop(host_tx);
    writer.await?;

    tracing::info!("bridge shutting down");
    Ok(())
}

/// Decode one stdin line into a host message. Blank lines and lines that
/// are not valid JSON objects are skipped; unknown-but-valid message types
/// decode to `HostMessage::Unknown` and are dropped by the controller.
fn decode_host_line(line: &str) -> Option<HostMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(%err, "skipping undecodable host line");
            None
        }
    }
}

/// Encode one guest message as a single JSON object with no embedded
/// newlines, ready for line framing on stdout.
fn encode_guest_line(message: &GuestMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(line) => Some(line),
        Err(err) => {
            warn!(%err, "could not encode guest message");
            None
        }
    }
}
