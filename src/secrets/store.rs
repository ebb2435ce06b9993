//! Secure storage back ends
//!
//! - `KeyringStore`: OS keychain / keyring (one entry per service key)
//! - `FileStore`: JSON file written atomically (temp file + rename), for headless hosts
//! - `MemoryStore`: process memory only, used by tests and throwaway sessions

use async_trait::async_trait;
use keyring::{Entry, Error as KeyringError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, VaultError};
use crate::models::StoredCredentials;

/// Secure key-value store collaborator
///
/// Records are keyed by a service key and carry a username and an opaque secret.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, service: &str) -> Result<Option<StoredCredentials>>;

    async fn set(&self, service: &str, username: &str, secret: &str) -> Result<()>;

    /// Deleting an absent record is not an error
    async fn delete(&self, service: &str) -> Result<()>;
}

/// Which store to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Keyring,
    File(PathBuf),
    Memory,
}

impl StoreBackend {
    pub fn open(&self, username: &str) -> Arc<dyn SecureStore> {
        match self {
            StoreBackend::Keyring => Arc::new(KeyringStore::new(username)),
            StoreBackend::File(path) => Arc::new(FileStore::new(path.clone())),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

fn map_keyring_error(err: KeyringError) -> VaultError {
    VaultError::StorageUnavailable(format!("Keychain error: {}", err))
}

// =====================================
// Keyring
// =====================================

/// OS keychain store
///
/// The keychain indexes entries by (service, account), so the account used for lookups
/// is fixed at construction.
pub struct KeyringStore {
    account: String,
}

impl KeyringStore {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self, service: &str, account: &str) -> Result<Entry> {
        Entry::new(service, account).map_err(map_keyring_error)
    }
}

#[async_trait]
impl SecureStore for KeyringStore {
    async fn get(&self, service: &str) -> Result<Option<StoredCredentials>> {
        let entry = self.entry(service, &self.account)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(StoredCredentials {
                username: self.account.clone(),
                secret,
            })),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    async fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        if username != self.account {
            tracing::warn!(
                service,
                username,
                account = %self.account,
                "writing keychain entry under a different account than lookups use"
            );
        }
        let entry = self.entry(service, username)?;
        entry.set_password(secret).map_err(map_keyring_error)
    }

    async fn delete(&self, service: &str) -> Result<()> {
        let entry = self.entry(service, &self.account)?;
        match entry.delete_password() {
            Ok(()) => Ok(()),
            Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(map_keyring_error(err)),
        }
    }
}

// =====================================
// File
// =====================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStorePayload {
    entries: HashMap<String, StoredCredentials>,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_version() -> u32 {
    1
}

/// JSON file store
///
/// Secrets are already encrypted by the vault; the file only needs atomic replacement.
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_payload(&self) -> Result<FileStorePayload> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                VaultError::StorageUnavailable(format!(
                    "store file {} is unreadable: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileStorePayload::default()),
            Err(e) => Err(VaultError::StorageUnavailable(e.to_string())),
        }
    }

    async fn write_payload(&self, payload: &FileStorePayload) -> Result<()> {
        let io_err = |e: std::io::Error| VaultError::StorageUnavailable(e.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| VaultError::StorageUnavailable(e.to_string()))?;

        // Atomic write: temp file then rename
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes).await.map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn get(&self, service: &str) -> Result<Option<StoredCredentials>> {
        let _guard = self.lock.lock().await;
        let payload = self.read_payload().await?;
        Ok(payload.entries.get(service).cloned())
    }

    async fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut payload = self.read_payload().await?;
        payload.entries.insert(
            service.to_string(),
            StoredCredentials {
                username: username.to_string(),
                secret: secret.to_string(),
            },
        );
        self.write_payload(&payload).await
    }

    async fn delete(&self, service: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut payload = self.read_payload().await?;
        if payload.entries.remove(service).is_some() {
            self.write_payload(&payload).await?;
        }
        Ok(())
    }
}

// =====================================
// Memory
// =====================================

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredCredentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, service: &str) -> Result<Option<StoredCredentials>> {
        Ok(self.entries.read().await.get(service).cloned())
    }

    async fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        self.entries.write().await.insert(
            service.to_string(),
            StoredCredentials {
                username: username.to_string(),
                secret: secret.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, service: &str) -> Result<()> {
        self.entries.write().await.remove(service);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_store_overwrite_and_delete() {
        let store = MemoryStore::new();
        assert!(store.get("svc").await.unwrap().is_none());

        store.set("svc", "walletBundle", "one").await.unwrap();
        store.set("svc", "walletBundle", "two").await.unwrap();
        let record = store.get("svc").await.unwrap().unwrap();
        assert_eq!(record.secret, "two");
        assert_eq!(record.username, "walletBundle");

        store.delete("svc").await.unwrap();
        store.delete("svc").await.unwrap();
        assert!(store.get("svc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.json");

        let store = FileStore::new(path.clone());
        store.set("currentUserWallet", "walletBundle", "blob").await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileStore::new(path.clone());
        let record = reopened.get("currentUserWallet").await.unwrap().unwrap();
        assert_eq!(record.secret, "blob");

        reopened.delete("currentUserWallet").await.unwrap();
        assert!(store.get("currentUserWallet").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, b"{ nope").unwrap();

        let err = FileStore::new(path).get("svc").await.unwrap_err();
        assert!(matches!(err, VaultError::StorageUnavailable(_)));
    }
}
