//! Configuration
//!
//! Values come from the process environment. `load_env` first pulls in `.env.local`
//! (searched upward from the working directory and the executable) and `.env`.
//!
//! | Key | Default |
//! |-----|---------|
//! | `WALLET_SERVICE_KEY` | `currentUserWallet` |
//! | `WALLET_USERNAME` | `walletBundle` |
//! | `WALLET_STORE` | `keyring` (`file`, `memory`) |
//! | `WALLET_STORE_PATH` | `.wallet-vault/credentials.json` |
//! | `WALLET_CIPHER` | `cryptojs-aes` (`xchacha20poly1305`) |
//! | `WALLET_MIN_PASSWORD_LEN` | `6` |
//! | `WALLET_NETWORK` | `Avalanche Mainnet` |
//! | `WALLET_KDF_M_COST` / `_T_COST` / `_P_COST` | `65536` / `3` / `1` |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::models::Network;
use crate::password_change::PasswordPolicy;
use crate::secrets::cipher::{CipherKind, KdfParams, SymmetricCipher};
use crate::secrets::store::{SecureStore, StoreBackend};
use crate::secrets::vault::{CredentialVault, DEFAULT_SERVICE_KEY, DEFAULT_USERNAME};

pub const DEFAULT_STORE_PATH: &str = ".wallet-vault/credentials.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub service_key: String,
    pub username: String,
    pub store: StoreBackend,
    pub cipher: CipherKind,
    pub kdf: KdfParams,
    pub min_password_len: usize,
    pub network: Network,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            service_key: DEFAULT_SERVICE_KEY.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            store: StoreBackend::Keyring,
            cipher: CipherKind::CryptoJsAes,
            kdf: KdfParams::default(),
            min_password_len: PasswordPolicy::default().min_len,
            network: Network::default(),
        }
    }
}

impl VaultConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("WALLET_SERVICE_KEY") {
            config.service_key = v.trim().to_string();
        }
        if let Some(v) = get("WALLET_USERNAME") {
            config.username = v.trim().to_string();
        }

        let store_path = get("WALLET_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        if let Some(v) = get("WALLET_STORE") {
            config.store = parse_store(&v, store_path)?;
        }

        if let Some(v) = get("WALLET_CIPHER") {
            config.cipher = CipherKind::from_str(&v)?;
        }
        if let Some(v) = get("WALLET_MIN_PASSWORD_LEN") {
            config.min_password_len = parse_number("WALLET_MIN_PASSWORD_LEN", &v)?;
        }
        if let Some(v) = get("WALLET_NETWORK") {
            config.network = Network::by_name(&v)
                .ok_or_else(|| VaultError::Config(format!("unknown network: {}", v)))?;
        }
        if let Some(v) = get("WALLET_KDF_M_COST") {
            config.kdf.m_cost = parse_number("WALLET_KDF_M_COST", &v)?;
        }
        if let Some(v) = get("WALLET_KDF_T_COST") {
            config.kdf.t_cost = parse_number("WALLET_KDF_T_COST", &v)?;
        }
        if let Some(v) = get("WALLET_KDF_P_COST") {
            config.kdf.p_cost = parse_number("WALLET_KDF_P_COST", &v)?;
        }

        Ok(config)
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            min_len: self.min_password_len,
        }
    }

    pub fn open_store(&self) -> Arc<dyn SecureStore> {
        self.store.open(&self.username)
    }

    pub fn build_cipher(&self) -> Arc<dyn SymmetricCipher> {
        self.cipher.build(self.kdf)
    }

    pub fn build_vault(&self) -> CredentialVault {
        CredentialVault::new(
            self.open_store(),
            self.build_cipher(),
            self.service_key.clone(),
            self.username.clone(),
        )
    }
}

/// Parse a store backend name
pub fn parse_store(value: &str, path: PathBuf) -> Result<StoreBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "keyring" | "keychain" => Ok(StoreBackend::Keyring),
        "file" => Ok(StoreBackend::File(path)),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(VaultError::Config(format!("unknown store: {}", other))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| VaultError::Config(format!("{} must be a number, got '{}'", key, value)))
}

// =====================================
// .env loading
// =====================================

const ENV_LOCAL_FILE: &str = ".env.local";
/// Parent directories searched above the start directory
const ENV_SEARCH_DEPTH: usize = 6;

/// Split one `KEY=VALUE` line, accepting only the keys this crate reads
///
/// Comments, blank lines and foreign keys yield `None`. Matching single or double quotes
/// around the value are removed.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();

    let known = key == "RUST_LOG"
        || (key.starts_with("WALLET_")
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
    if !known {
        return None;
    }

    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|&q| value.strip_prefix(q).and_then(|v| v.strip_suffix(q)))
        .unwrap_or(value);
    Some((key, unquoted))
}

/// Line-by-line fallback for files dotenvy refuses
///
/// Values already set (non-empty) in the environment win.
fn load_env_file_lenient(path: &Path) -> std::io::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let mut loaded = 0;

    for (key, value) in text.lines().filter_map(parse_env_line) {
        let already_set = std::env::var(key).map_or(false, |v| !v.trim().is_empty());
        if !already_set {
            std::env::set_var(key, value);
            loaded += 1;
        }
    }
    Ok(loaded)
}

/// First `filename` found in `start` or up to `depth` of its ancestors
fn find_in_ancestors(start: &Path, filename: &str, depth: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(depth + 1)
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Populate the environment from `.env.local` and `.env`, ignoring missing files
///
/// `.env.local` is looked up from the working directory first, then from the directory
/// holding the executable.
pub fn load_env() {
    let start_dirs = [
        std::env::current_dir().ok(),
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf)),
    ];
    let local = start_dirs
        .iter()
        .flatten()
        .find_map(|dir| find_in_ancestors(dir, ENV_LOCAL_FILE, ENV_SEARCH_DEPTH));

    if let Some(path) = local {
        match dotenvy::from_path(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "loaded env file"),
            Err(e) => match load_env_file_lenient(&path) {
                Ok(loaded) => tracing::debug!(
                    path = %path.display(),
                    loaded,
                    error = %e,
                    "loaded env file leniently"
                ),
                Err(io) => {
                    tracing::warn!(path = %path.display(), error = %io, "env file unreadable")
                }
            },
        }
    }

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }
}
