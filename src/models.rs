//! Wallet Vault Data Models
//!
//! Persisted credential bundle and the network catalogue.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Encrypted credential bundle kept in secure storage
///
/// The JSON shape matches what the mobile app stored:
/// `{"encryptedPrivateKey": "...", "encryptedMnemonic": null}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    #[serde(rename = "encryptedPrivateKey")]
    pub encrypted_private_key: String,
    /// Only present when the wallet was set up from a recovery phrase
    #[serde(rename = "encryptedMnemonic", default)]
    pub encrypted_mnemonic: Option<String>,
}

impl CredentialBundle {
    /// Serialize to the opaque text blob stored under the service key
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| VaultError::MalformedBundle(e.to_string()))
    }

    /// Parse a stored blob
    pub fn from_json(blob: &str) -> Result<Self> {
        let bundle: CredentialBundle = serde_json::from_str(blob)
            .map_err(|e| VaultError::MalformedBundle(e.to_string()))?;

        if bundle.encrypted_private_key.trim().is_empty() {
            return Err(VaultError::MalformedBundle(
                "encryptedPrivateKey is empty".to_string(),
            ));
        }

        Ok(bundle)
    }

    pub fn has_mnemonic(&self) -> bool {
        self.encrypted_mnemonic.is_some()
    }
}

/// A record as returned by a secure store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub username: String,
    pub secret: String,
}

/// Which secret to reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    PrivateKey,
    Mnemonic,
}

/// EVM network definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub name: &'static str,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: &'static str,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "explorerUrl")]
    pub explorer_url: &'static str,
    #[serde(rename = "currencySymbol")]
    pub currency_symbol: &'static str,
}

pub const AVALANCHE_MAINNET: Network = Network {
    name: "Avalanche Mainnet",
    rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    chain_id: 43114,
    explorer_url: "https://snowtrace.io",
    currency_symbol: "AVAX",
};

pub const AVALANCHE_FUJI: Network = Network {
    name: "Avalanche Fuji Testnet",
    rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
    chain_id: 43113,
    explorer_url: "https://testnet.snowtrace.io",
    currency_symbol: "AVAX",
};

pub const SUPPORTED_NETWORKS: &[Network] = &[AVALANCHE_MAINNET, AVALANCHE_FUJI];

impl Network {
    /// Look up a supported network by display name (case-insensitive)
    pub fn by_name(name: &str) -> Option<Network> {
        let name = name.trim();
        SUPPORTED_NETWORKS
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}

impl Default for Network {
    fn default() -> Self {
        AVALANCHE_MAINNET
    }
}
