//! Credential Vault
//!
//! Seals a private key (and optional recovery phrase) under a user password and keeps the
//! resulting bundle in secure storage under one fixed service key.
//!
//! Each field is encrypted independently. The ciphers carry no integrity check, so a
//! decrypted value only counts when it is non-empty valid UTF-8; anything else is a
//! wrong password.

use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::models::{CredentialBundle, SecretKind};
use crate::secrets::cipher::SymmetricCipher;
use crate::secrets::store::SecureStore;

/// Default service key for the wallet record
pub const DEFAULT_SERVICE_KEY: &str = "currentUserWallet";
/// Default account name for the wallet record
pub const DEFAULT_USERNAME: &str = "walletBundle";

/// Plaintext secrets recovered from a bundle (zeroized on drop)
pub struct UnsealedSecrets {
    pub private_key: Zeroizing<String>,
    pub mnemonic: Option<Zeroizing<String>>,
}

impl fmt::Debug for UnsealedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealedSecrets")
            .field("private_key", &"<redacted>")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Credential vault over an injected store and cipher
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn SecureStore>,
    cipher: Arc<dyn SymmetricCipher>,
    service_key: String,
    username: String,
}

impl CredentialVault {
    pub fn new(
        store: Arc<dyn SecureStore>,
        cipher: Arc<dyn SymmetricCipher>,
        service_key: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cipher,
            service_key: service_key.into(),
            username: username.into(),
        }
    }

    /// Vault with the default service key and username
    pub fn with_defaults(store: Arc<dyn SecureStore>, cipher: Arc<dyn SymmetricCipher>) -> Self {
        Self::new(store, cipher, DEFAULT_SERVICE_KEY, DEFAULT_USERNAME)
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    // =====================================
    // Cipher operations
    // =====================================

    /// Encrypt the private key and, if given, the mnemonic under `password`
    pub fn seal(
        &self,
        password: &str,
        private_key: &str,
        mnemonic: Option<&str>,
    ) -> Result<CredentialBundle> {
        let encrypted_private_key = self.cipher.encrypt(private_key, password)?;
        let encrypted_mnemonic = mnemonic
            .map(|m| self.cipher.encrypt(m, password))
            .transpose()?;

        Ok(CredentialBundle {
            encrypted_private_key,
            encrypted_mnemonic,
        })
    }

    /// Decrypt both fields of a bundle
    pub fn unseal(&self, bundle: &CredentialBundle, password: &str) -> Result<UnsealedSecrets> {
        let private_key = self.unseal_private_key(bundle, password)?;
        let mnemonic = bundle
            .encrypted_mnemonic
            .as_deref()
            .map(|m| self.open_field(m, password))
            .transpose()?;

        Ok(UnsealedSecrets {
            private_key,
            mnemonic,
        })
    }

    /// Decrypt only the private key
    pub fn unseal_private_key(
        &self,
        bundle: &CredentialBundle,
        password: &str,
    ) -> Result<Zeroizing<String>> {
        self.open_field(&bundle.encrypted_private_key, password)
    }

    /// Re-encrypt a bundle under a new password
    pub fn rotate(
        &self,
        old_password: &str,
        new_password: &str,
        bundle: &CredentialBundle,
    ) -> Result<CredentialBundle> {
        let secrets = self.unseal(bundle, old_password)?;
        self.seal(
            new_password,
            &secrets.private_key,
            secrets.mnemonic.as_deref().map(String::as_str),
        )
    }

    fn open_field(&self, ciphertext: &str, password: &str) -> Result<Zeroizing<String>> {
        let bytes = self.cipher.decrypt(ciphertext, password)?;

        // Garbage output from a wrong key is rarely valid UTF-8
        let text = match std::str::from_utf8(&bytes) {
            Ok(text) if !text.is_empty() => text,
            _ => return Err(VaultError::AuthenticationFailed),
        };

        Ok(Zeroizing::new(text.to_string()))
    }

    // =====================================
    // Storage operations
    // =====================================

    /// Read the stored bundle
    pub async fn load(&self) -> Result<Option<CredentialBundle>> {
        let Some(record) = self.store.get(&self.service_key).await? else {
            return Ok(None);
        };

        if record.username != self.username {
            return Err(VaultError::MalformedBundle(format!(
                "unexpected account name '{}'",
                record.username
            )));
        }

        CredentialBundle::from_json(&record.secret).map(Some)
    }

    /// Read the stored bundle, failing when there is none
    pub async fn load_required(&self) -> Result<CredentialBundle> {
        self.load().await?.ok_or(VaultError::NoWallet)
    }

    /// Replace the stored bundle
    pub async fn persist(&self, bundle: &CredentialBundle) -> Result<()> {
        let blob = bundle.to_json()?;
        self.store
            .set(&self.service_key, &self.username, &blob)
            .await?;

        tracing::debug!(
            service = %self.service_key,
            cipher = self.cipher.name(),
            has_mnemonic = bundle.has_mnemonic(),
            "credential bundle persisted"
        );
        Ok(())
    }

    /// Remove the stored bundle
    pub async fn erase(&self) -> Result<()> {
        self.store.delete(&self.service_key).await?;
        tracing::info!(service = %self.service_key, "credential bundle erased");
        Ok(())
    }

    pub async fn has_wallet(&self) -> Result<bool> {
        Ok(self.store.get(&self.service_key).await?.is_some())
    }

    /// Load, rotate and write back the stored bundle
    pub async fn rotate_stored(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<CredentialBundle> {
        let bundle = self.load_required().await?;
        let rotated = self.rotate(old_password, new_password, &bundle)?;
        self.persist(&rotated).await?;

        tracing::info!(service = %self.service_key, "wallet password rotated");
        Ok(rotated)
    }

    /// Decrypt one stored secret for display
    pub async fn reveal(&self, password: &str, kind: SecretKind) -> Result<Zeroizing<String>> {
        let bundle = self.load_required().await?;
        match kind {
            SecretKind::PrivateKey => self.unseal_private_key(&bundle, password),
            SecretKind::Mnemonic => {
                let encrypted = bundle
                    .encrypted_mnemonic
                    .as_deref()
                    .ok_or(VaultError::MnemonicUnavailable)?;
                self.open_field(encrypted, password)
            }
        }
    }
}
