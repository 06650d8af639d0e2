//! # causerie
//!
//! Terminal chat client over the causerie thread stack. Lines you type are
//! posted to the active channel; `/`-prefixed lines are commands
//! (`/help` lists them). The wallet file holds the Ed25519 keypair you
//! chat as and is generated on first run.

mod app;
mod config;

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use causerie_node::MemoryHub;

use crate::app::ChatApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,causerie=debug")),
        )
        .init();

    let wallet_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("wallet.json"));

    let identity = config::load_or_generate(&wallet_path)?;

    let hub = MemoryHub::new();
    // A starter channel so there is somewhere to talk right away.
    hub.create_channel(&identity, b"general", None)?;

    let mut app = ChatApp::new(hub, identity);

    info!("Type /help for list of commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Err(error) = app.handle_line(&line).await {
            eprintln!("Error: {error}");
        }
    }

    Ok(())
}
