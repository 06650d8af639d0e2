//! Wallet configuration: the keypair the CLI chats as.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use causerie_shared::Identity;

/// On-disk wallet file. Holds the Ed25519 secret key in hex.
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletConfig {
    pub secret_key: String,
}

impl WalletConfig {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            secret_key: hex::encode(identity.secret_bytes()),
        }
    }

    pub fn identity(&self) -> anyhow::Result<Identity> {
        let bytes = hex::decode(&self.secret_key).context("wallet secret key is not hex")?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("wallet secret key must be 32 bytes"))?;
        Ok(Identity::from_secret_bytes(&secret))
    }
}

/// Load the wallet at `path`, generating and saving a fresh identity when
/// the file does not exist yet.
pub fn load_or_generate(path: &Path) -> anyhow::Result<Identity> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading wallet {}", path.display()))?;
        let config: WalletConfig =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let identity = config.identity()?;
        info!(public_key = %identity.public_key(), "wallet loaded");
        return Ok(identity);
    }

    let identity = Identity::generate();
    let config = WalletConfig::from_identity(&identity);
    let raw = serde_json::to_string_pretty(&config)?;
    std::fs::write(path, raw).with_context(|| format!("writing wallet {}", path.display()))?;
    info!(public_key = %identity.public_key(), path = %path.display(), "new wallet generated");
    Ok(identity)
}
