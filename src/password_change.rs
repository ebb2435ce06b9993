//! Password change flow
//!
//! `Idle -> AwaitingOldPassword -> AwaitingNewPassword -> Idle`
//!
//! Plaintext secrets recovered in the verify step are staged until the new password is
//! confirmed. Staging is dropped (and zeroized) on success, on storage failure, on cancel
//! and whenever the flow is reopened.

use crate::error::{Result, VaultError};
use crate::secrets::vault::{CredentialVault, UnsealedSecrets};

/// Password rules shared by setup and rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_len: 6 }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str, confirm: &str) -> Result<()> {
        if password.chars().count() < self.min_len {
            return Err(VaultError::ValidationFailed(format!(
                "The password must be at least {} characters.",
                self.min_len
            )));
        }
        if password != confirm {
            return Err(VaultError::ValidationFailed(
                "The passwords do not match.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Visible step of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChangeStep {
    Idle,
    AwaitingOldPassword,
    AwaitingNewPassword,
}

enum State {
    Idle,
    AwaitingOldPassword,
    AwaitingNewPassword(UnsealedSecrets),
}

pub struct PasswordChangeFlow {
    state: State,
    policy: PasswordPolicy,
}

impl PasswordChangeFlow {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self {
            state: State::Idle,
            policy,
        }
    }

    pub fn step(&self) -> PasswordChangeStep {
        match self.state {
            State::Idle => PasswordChangeStep::Idle,
            State::AwaitingOldPassword => PasswordChangeStep::AwaitingOldPassword,
            State::AwaitingNewPassword(_) => PasswordChangeStep::AwaitingNewPassword,
        }
    }

    /// Whether plaintext secrets are currently held
    pub fn has_staged_secrets(&self) -> bool {
        matches!(self.state, State::AwaitingNewPassword(_))
    }

    /// Start (or restart) the flow
    pub fn open(&mut self) {
        self.state = State::AwaitingOldPassword;
    }

    /// Abandon the flow from any step
    pub fn cancel(&mut self) {
        if self.has_staged_secrets() {
            tracing::debug!("password change cancelled, staged secrets discarded");
        }
        self.state = State::Idle;
    }

    /// Check the current password and stage the decrypted secrets
    pub async fn verify_old_password(
        &mut self,
        vault: &CredentialVault,
        password: &str,
    ) -> Result<()> {
        if !matches!(self.state, State::AwaitingOldPassword) {
            return Err(VaultError::InvalidState(
                "current password is not being requested".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(VaultError::ValidationFailed(
                "Please enter your current password.".to_string(),
            ));
        }

        let bundle = vault.load_required().await?;
        let secrets = vault.unseal(&bundle, password)?;

        self.state = State::AwaitingNewPassword(secrets);
        Ok(())
    }

    /// Re-seal the staged secrets under the new password and store them
    pub async fn confirm_new_password(
        &mut self,
        vault: &CredentialVault,
        new_password: &str,
        confirm: &str,
    ) -> Result<()> {
        let secrets = match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitingNewPassword(secrets) => secrets,
            other => {
                self.state = other;
                return Err(VaultError::InvalidState(
                    "current password has not been verified".to_string(),
                ));
            }
        };

        // Policy errors keep the staged secrets so the user can retry
        if let Err(e) = self.policy.check(new_password, confirm) {
            self.state = State::AwaitingNewPassword(secrets);
            return Err(e);
        }

        let bundle = vault.seal(
            new_password,
            &secrets.private_key,
            secrets.mnemonic.as_deref().map(String::as_str),
        )?;
        drop(secrets);

        vault.persist(&bundle).await?;
        tracing::info!("wallet password changed");
        Ok(())
    }
}

impl Default for PasswordChangeFlow {
    fn default() -> Self {
        Self::new(PasswordPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SecretKind;
    use crate::secrets::cipher::CryptoJsAes;
    use crate::models::StoredCredentials;
    use crate::secrets::store::{MemoryStore, SecureStore};
    use crate::secrets::vault::{DEFAULT_SERVICE_KEY, DEFAULT_USERNAME};
    use async_trait::async_trait;
    use std::sync::Arc;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    /// Holds a wallet but rejects every write
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl SecureStore for ReadOnlyStore {
        async fn get(&self, service: &str) -> Result<Option<StoredCredentials>> {
            self.0.get(service).await
        }

        async fn set(&self, _service: &str, _username: &str, _secret: &str) -> Result<()> {
            Err(VaultError::StorageUnavailable("disk full".into()))
        }

        async fn delete(&self, service: &str) -> Result<()> {
            self.0.delete(service).await
        }
    }

    async fn stored_vault() -> CredentialVault {
        let vault =
            CredentialVault::with_defaults(Arc::new(MemoryStore::new()), Arc::new(CryptoJsAes));
        let bundle = vault.seal("old-pass", "0xabc123", Some(PHRASE)).unwrap();
        vault.persist(&bundle).await.unwrap();
        vault
    }

    #[test]
    fn test_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("123456", "123456").is_ok());
        assert!(matches!(policy.check("12345", "12345"), Err(VaultError::ValidationFailed(_))));
        assert!(matches!(policy.check("1234567", "7654321"), Err(VaultError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_full_flow() {
        let vault = stored_vault().await;
        let mut flow = PasswordChangeFlow::default();
        assert_eq!(flow.step(), PasswordChangeStep::Idle);

        flow.open();
        assert_eq!(flow.step(), PasswordChangeStep::AwaitingOldPassword);

        flow.verify_old_password(&vault, "old-pass").await.unwrap();
        assert_eq!(flow.step(), PasswordChangeStep::AwaitingNewPassword);
        assert!(flow.has_staged_secrets());

        flow.confirm_new_password(&vault, "new-pass", "new-pass").await.unwrap();
        assert_eq!(flow.step(), PasswordChangeStep::Idle);
        assert!(!flow.has_staged_secrets());

        let mnemonic = vault.reveal("new-pass", SecretKind::Mnemonic).await.unwrap();
        assert_eq!(mnemonic.as_str(), PHRASE);
        assert!(matches!(
            vault.reveal("old-pass", SecretKind::PrivateKey).await,
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn test_wrong_old_password_stays_on_step() {
        let vault = stored_vault().await;
        let mut flow = PasswordChangeFlow::default();
        flow.open();

        let err = flow.verify_old_password(&vault, "bad").await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed));
        assert_eq!(flow.step(), PasswordChangeStep::AwaitingOldPassword);
        assert!(!flow.has_staged_secrets());
    }

    #[tokio::test]
    async fn test_policy_failure_keeps_staging_then_cancel_clears() {
        let vault = stored_vault().await;
        let mut flow = PasswordChangeFlow::default();
        flow.open();
        flow.verify_old_password(&vault, "old-pass").await.unwrap();

        let err = flow.confirm_new_password(&vault, "abc", "abc").await.unwrap_err();
        assert!(matches!(err, VaultError::ValidationFailed(_)));
        assert!(flow.has_staged_secrets());

        flow.cancel();
        assert_eq!(flow.step(), PasswordChangeStep::Idle);
        assert!(!flow.has_staged_secrets());

        // Old password still valid after abandoning
        assert!(vault.reveal("old-pass", SecretKind::PrivateKey).await.is_ok());
    }

    #[tokio::test]
    async fn test_storage_failure_discards_staging() {
        let store = Arc::new(ReadOnlyStore(MemoryStore::new()));
        let vault = CredentialVault::with_defaults(store.clone(), Arc::new(CryptoJsAes));
        let bundle = vault.seal("old-pass", "0xabc123", Some(PHRASE)).unwrap();
        store
            .0
            .set(DEFAULT_SERVICE_KEY, DEFAULT_USERNAME, &bundle.to_json().unwrap())
            .await
            .unwrap();

        let mut flow = PasswordChangeFlow::default();
        flow.open();
        flow.verify_old_password(&vault, "old-pass").await.unwrap();

        let err = flow
            .confirm_new_password(&vault, "new-pass", "new-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::StorageUnavailable(_)));
        assert_eq!(flow.step(), PasswordChangeStep::Idle);
        assert!(!flow.has_staged_secrets());

        // The stored bundle is untouched
        assert!(vault.reveal("old-pass", SecretKind::PrivateKey).await.is_ok());
    }

    #[tokio::test]
    async fn test_reopen_discards_staging() {
        let vault = stored_vault().await;
        let mut flow = PasswordChangeFlow::default();
        flow.open();
        flow.verify_old_password(&vault, "old-pass").await.unwrap();

        flow.open();
        assert_eq!(flow.step(), PasswordChangeStep::AwaitingOldPassword);
        assert!(!flow.has_staged_secrets());
    }

    #[tokio::test]
    async fn test_out_of_order_steps() {
        let vault = stored_vault().await;
        let mut flow = PasswordChangeFlow::default();

        assert!(matches!(
            flow.verify_old_password(&vault, "old-pass").await,
            Err(VaultError::InvalidState(_))
        ));
        assert!(matches!(
            flow.confirm_new_password(&vault, "new-pass", "new-pass").await,
            Err(VaultError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_wallet() {
        let vault =
            CredentialVault::with_defaults(Arc::new(MemoryStore::new()), Arc::new(CryptoJsAes));
        let mut flow = PasswordChangeFlow::default();
        flow.open();
        assert!(matches!(
            flow.verify_old_password(&vault, "pw").await,
            Err(VaultError::NoWallet)
        ));
    }
}
