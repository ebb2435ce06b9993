//! Session and application controller
//!
//! The controller owns the authentication lifecycle and the in-memory session. Anything
//! that needs the wallet address or active network borrows the session from it; nothing
//! is kept in process-wide state.

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::models::{Network, SecretKind};
use crate::password_change::{PasswordChangeFlow, PasswordPolicy};
use crate::secrets::vault::CredentialVault;
use crate::wallet::{self, DEFAULT_WORD_COUNT};

/// Unlocked wallet state held in memory only
pub struct Session {
    private_key: Zeroizing<String>,
    address: String,
    network: Network,
    unlocked_at: DateTime<Utc>,
}

impl Session {
    fn new(private_key: Zeroizing<String>, network: Network) -> Result<Self> {
        let address = wallet::address_from_private_key(&private_key)?;
        Ok(Self {
            private_key,
            address,
            network,
            unlocked_at: Utc::now(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    /// Plaintext key for signing collaborators
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("network", &self.network.name)
            .field("unlocked_at", &self.unlocked_at)
            .finish_non_exhaustive()
    }
}

/// Where the user is in the auth lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing stored; show create/import
    NoWallet,
    /// A bundle exists; ask for the password
    Locked,
    Unlocked,
}

/// Top-level controller
pub struct AppController {
    vault: CredentialVault,
    policy: PasswordPolicy,
    default_network: Network,
    state: AuthState,
    session: Option<Session>,
    password_change: PasswordChangeFlow,
}

impl AppController {
    pub fn new(vault: CredentialVault, policy: PasswordPolicy, default_network: Network) -> Self {
        Self {
            vault,
            policy,
            default_network,
            state: AuthState::NoWallet,
            session: None,
            password_change: PasswordChangeFlow::new(policy),
        }
    }

    /// Controller wired from configuration
    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(
            config.build_vault(),
            config.password_policy(),
            config.network.clone(),
        )
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Decide the initial screen from what is in secure storage
    pub async fn bootstrap(&mut self) -> AuthState {
        self.state = match self.vault.has_wallet().await {
            Ok(true) => AuthState::Locked,
            Ok(false) => AuthState::NoWallet,
            Err(e) => {
                tracing::error!(error = %e, "secure storage check failed");
                AuthState::NoWallet
            }
        };
        self.session = None;
        self.state
    }

    // =====================================
    // Setup
    // =====================================

    /// Store a freshly generated (and verified) phrase
    pub async fn create_wallet(
        &mut self,
        mnemonic: &str,
        password: &str,
        confirm: &str,
    ) -> Result<&Session> {
        self.setup_from_mnemonic(mnemonic, None, password, confirm).await
    }

    /// Import an existing 12-word phrase
    pub async fn import_mnemonic(
        &mut self,
        mnemonic: &str,
        password: &str,
        confirm: &str,
    ) -> Result<&Session> {
        self.setup_from_mnemonic(mnemonic, Some(DEFAULT_WORD_COUNT), password, confirm)
            .await
    }

    /// Import a raw private key (no recovery phrase is stored)
    pub async fn import_private_key(
        &mut self,
        private_key: &str,
        password: &str,
        confirm: &str,
    ) -> Result<&Session> {
        let private_key = wallet::parse_private_key(private_key)?;
        self.policy.check(password, confirm)?;
        self.install(private_key, None, password).await
    }

    async fn setup_from_mnemonic(
        &mut self,
        mnemonic: &str,
        expected_words: Option<usize>,
        password: &str,
        confirm: &str,
    ) -> Result<&Session> {
        let mnemonic = wallet::parse_mnemonic(mnemonic, expected_words)?;
        let private_key = wallet::private_key_from_mnemonic(&mnemonic)?;
        self.policy.check(password, confirm)?;
        self.install(private_key, Some(mnemonic), password).await
    }

    async fn install(
        &mut self,
        private_key: Zeroizing<String>,
        mnemonic: Option<Zeroizing<String>>,
        password: &str,
    ) -> Result<&Session> {
        let bundle = self.vault.seal(
            password,
            &private_key,
            mnemonic.as_deref().map(String::as_str),
        )?;

        // Overwrites any previous record; a failed write leaves it in place
        self.vault.persist(&bundle).await?;

        self.start_session(private_key)
    }

    // =====================================
    // Lifecycle
    // =====================================

    /// Unlock the stored wallet with its password
    pub async fn unlock(&mut self, password: &str) -> Result<&Session> {
        if password.is_empty() {
            return Err(VaultError::ValidationFailed(
                "Please enter your password.".to_string(),
            ));
        }

        let bundle = match self.vault.load().await? {
            Some(bundle) => bundle,
            None => {
                self.state = AuthState::NoWallet;
                return Err(VaultError::NoWallet);
            }
        };
        let decrypted = self.vault.unseal_private_key(&bundle, password)?;

        // Valid UTF-8 garbage from a wrong password still fails here
        let private_key =
            wallet::parse_private_key(&decrypted).map_err(|_| VaultError::AuthenticationFailed)?;

        self.start_session(private_key)
    }

    fn start_session(&mut self, private_key: Zeroizing<String>) -> Result<&Session> {
        let session = Session::new(private_key, self.default_network.clone())?;
        tracing::info!(address = %session.address, network = session.network.name, "wallet unlocked");

        self.state = AuthState::Unlocked;
        self.password_change.cancel();
        Ok(self.session.insert(session))
    }

    /// Drop the session but keep the stored wallet
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("wallet locked");
        }
        self.password_change.cancel();
        if self.state == AuthState::Unlocked {
            self.state = AuthState::Locked;
        }
    }

    /// Leave the password screen for create/import without deleting anything
    pub fn switch_to_auth_flow(&mut self) {
        self.session = None;
        self.password_change.cancel();
        self.state = AuthState::NoWallet;
    }

    /// Delete the stored wallet and end the session
    pub async fn logout(&mut self) -> Result<()> {
        self.vault.erase().await?;
        self.session = None;
        self.password_change.cancel();
        self.state = AuthState::NoWallet;
        tracing::info!("logged out");
        Ok(())
    }

    pub fn set_network(&mut self, name: &str) -> Result<&Network> {
        let network = Network::by_name(name)
            .ok_or_else(|| VaultError::ValidationFailed(format!("Unknown network: {}", name)))?;
        let session = self.session.as_mut().ok_or(VaultError::Locked)?;

        if session.network != network {
            tracing::info!(network = network.name, "network switched");
            session.network = network;
        }
        Ok(&session.network)
    }

    // =====================================
    // Settings
    // =====================================

    /// Decrypt a stored secret for display; requires an unlocked session
    pub async fn reveal(&self, password: &str, kind: SecretKind) -> Result<Zeroizing<String>> {
        if self.session.is_none() {
            return Err(VaultError::Locked);
        }
        if password.is_empty() {
            return Err(VaultError::ValidationFailed(
                "Please enter your password.".to_string(),
            ));
        }
        self.vault.reveal(password, kind).await
    }

    pub fn password_change(&self) -> &PasswordChangeFlow {
        &self.password_change
    }

    pub fn open_password_change(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(VaultError::Locked);
        }
        self.password_change.open();
        Ok(())
    }

    pub async fn verify_current_password(&mut self, password: &str) -> Result<()> {
        self.password_change
            .verify_old_password(&self.vault, password)
            .await
    }

    pub async fn confirm_new_password(&mut self, new_password: &str, confirm: &str) -> Result<()> {
        self.password_change
            .confirm_new_password(&self.vault, new_password, confirm)
            .await
    }

    pub fn cancel_password_change(&mut self) {
        self.password_change.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AVALANCHE_FUJI;
    use crate::password_change::PasswordChangeStep;
    use crate::secrets::cipher::CryptoJsAes;
    use crate::models::StoredCredentials;
    use crate::secrets::store::{MemoryStore, SecureStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const PHRASE_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    /// Reads and deletes work; writes fail
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

    struct UnreachableStore;

    #[async_trait]
    impl SecureStore for UnreachableStore {
        async fn get(&self, _service: &str) -> Result<Option<StoredCredentials>> {
            Err(VaultError::StorageUnavailable("keychain locked".into()))
        }

        async fn set(&self, _service: &str, _username: &str, _secret: &str) -> Result<()> {
            Err(VaultError::StorageUnavailable("keychain locked".into()))
        }

        async fn delete(&self, _service: &str) -> Result<()> {
            Err(VaultError::StorageUnavailable("keychain locked".into()))
        }
    }

    fn controller() -> AppController {
        let vault =
            CredentialVault::with_defaults(Arc::new(MemoryStore::new()), Arc::new(CryptoJsAes));
        AppController::new(vault, PasswordPolicy::default(), Network::default())
    }

    #[tokio::test]
    async fn test_create_lock_unlock() {
        let mut app = controller();
        assert_eq!(app.bootstrap().await, AuthState::NoWallet);

        let address = app
            .create_wallet(PHRASE, "secret1", "secret1")
            .await
            .unwrap()
            .address()
            .to_string();
        assert_eq!(address, PHRASE_ADDRESS);
        assert_eq!(app.state(), AuthState::Unlocked);

        app.lock();
        assert_eq!(app.state(), AuthState::Locked);
        assert!(app.session().is_none());

        assert!(matches!(
            app.unlock("wrong-password").await,
            Err(VaultError::AuthenticationFailed)
        ));
        assert_eq!(app.state(), AuthState::Locked);

        let session = app.unlock("secret1").await.unwrap();
        assert_eq!(session.address(), PHRASE_ADDRESS);
        assert_eq!(session.network().chain_id, 43114);
    }

    #[tokio::test]
    async fn test_bootstrap_finds_existing_wallet() {
        let mut app = controller();
        app.import_private_key(KEY_ONE, "secret1", "secret1").await.unwrap();

        let mut restarted = AppController::new(
            app.vault().clone(),
            PasswordPolicy::default(),
            Network::default(),
        );
        assert_eq!(restarted.bootstrap().await, AuthState::Locked);
        assert_eq!(
            restarted.unlock("secret1").await.unwrap().address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_wallet() {
        use crate::secrets::vault::{DEFAULT_SERVICE_KEY, DEFAULT_USERNAME};

        let store = Arc::new(ReadOnlyStore(MemoryStore::new()));
        let vault = CredentialVault::with_defaults(store.clone(), Arc::new(CryptoJsAes));
        let existing = vault.seal("secret1", KEY_ONE, None).unwrap();
        store
            .0
            .set(DEFAULT_SERVICE_KEY, DEFAULT_USERNAME, &existing.to_json().unwrap())
            .await
            .unwrap();

        let mut app = AppController::new(vault, PasswordPolicy::default(), Network::default());
        assert_eq!(app.bootstrap().await, AuthState::Locked);

        let key_two = "0x0000000000000000000000000000000000000000000000000000000000000002";
        assert!(matches!(
            app.import_private_key(key_two, "secret2", "secret2").await,
            Err(VaultError::StorageUnavailable(_))
        ));
        assert_eq!(app.state(), AuthState::Locked);
        assert!(app.session().is_none());
        assert!(app.vault().has_wallet().await.unwrap());

        assert_eq!(
            app.unlock("secret1").await.unwrap().address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_storage_error_means_no_wallet() {
        let vault =
            CredentialVault::with_defaults(Arc::new(UnreachableStore), Arc::new(CryptoJsAes));
        let mut app = AppController::new(vault, PasswordPolicy::default(), Network::default());

        assert_eq!(app.bootstrap().await, AuthState::NoWallet);
        assert_eq!(app.state(), AuthState::NoWallet);
        assert!(app.session().is_none());
    }

    #[tokio::test]
    async fn test_validation_happens_before_write() {
        let mut app = controller();

        assert!(matches!(
            app.import_private_key("0xnothex", "secret1", "secret1").await,
            Err(VaultError::ValidationFailed(_))
        ));
        assert!(matches!(
            app.import_mnemonic("abandon abandon", "secret1", "secret1").await,
            Err(VaultError::ValidationFailed(_))
        ));
        assert!(matches!(
            app.import_mnemonic(PHRASE, "short", "short").await,
            Err(VaultError::ValidationFailed(_))
        ));
        assert!(matches!(
            app.import_private_key(KEY_ONE, "secret1", "secret2").await,
            Err(VaultError::ValidationFailed(_))
        ));

        assert!(!app.vault().has_wallet().await.unwrap());
        assert_eq!(app.state(), AuthState::NoWallet);
    }

    #[tokio::test]
    async fn test_reveal_secrets() {
        let mut app = controller();
        app.import_mnemonic(PHRASE, "secret1", "secret1").await.unwrap();

        let mnemonic = app.reveal("secret1", SecretKind::Mnemonic).await.unwrap();
        assert_eq!(mnemonic.as_str(), PHRASE);
        assert!(matches!(
            app.reveal("nope!!", SecretKind::PrivateKey).await,
            Err(VaultError::AuthenticationFailed)
        ));

        app.lock();
        assert!(matches!(
            app.reveal("secret1", SecretKind::PrivateKey).await,
            Err(VaultError::Locked)
        ));
    }

    #[tokio::test]
    async fn test_private_key_wallet_has_no_mnemonic() {
        let mut app = controller();
        app.import_private_key(KEY_ONE, "secret1", "secret1").await.unwrap();
        assert!(matches!(
            app.reveal("secret1", SecretKind::Mnemonic).await,
            Err(VaultError::MnemonicUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_password_change_through_controller() {
        let mut app = controller();
        app.import_mnemonic(PHRASE, "secret1", "secret1").await.unwrap();

        app.open_password_change().unwrap();
        app.verify_current_password("secret1").await.unwrap();
        assert_eq!(app.password_change().step(), PasswordChangeStep::AwaitingNewPassword);

        // Locking mid-flow discards the staged secrets
        app.lock();
        assert_eq!(app.password_change().step(), PasswordChangeStep::Idle);
        assert!(!app.password_change().has_staged_secrets());

        app.unlock("secret1").await.unwrap();
        app.open_password_change().unwrap();
        app.verify_current_password("secret1").await.unwrap();
        app.confirm_new_password("secret2", "secret2").await.unwrap();

        app.lock();
        assert!(app.unlock("secret1").await.is_err());
        assert_eq!(app.unlock("secret2").await.unwrap().address(), PHRASE_ADDRESS);
    }

    #[tokio::test]
    async fn test_logout_and_switch() {
        let mut app = controller();
        app.import_private_key(KEY_ONE, "secret1", "secret1").await.unwrap();

        app.switch_to_auth_flow();
        assert_eq!(app.state(), AuthState::NoWallet);
        assert!(app.vault().has_wallet().await.unwrap());

        app.unlock("secret1").await.unwrap();
        app.logout().await.unwrap();
        assert_eq!(app.state(), AuthState::NoWallet);
        assert!(!app.vault().has_wallet().await.unwrap());
        assert!(matches!(app.unlock("secret1").await, Err(VaultError::NoWallet)));
    }

    #[tokio::test]
    async fn test_set_network() {
        let mut app = controller();
        assert!(matches!(app.set_network(AVALANCHE_FUJI.name), Err(VaultError::Locked)));

        app.import_private_key(KEY_ONE, "secret1", "secret1").await.unwrap();
        assert_eq!(app.set_network(AVALANCHE_FUJI.name).unwrap().chain_id, 43113);
        assert_eq!(app.session().unwrap().network().name, AVALANCHE_FUJI.name);
        assert!(matches!(
            app.set_network("Solana"),
            Err(VaultError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_from_config_with_aead_cipher() {
        use crate::secrets::cipher::{CipherKind, KdfParams};
        use crate::secrets::store::StoreBackend;

        let config = VaultConfig {
            store: StoreBackend::Memory,
            cipher: CipherKind::XChaCha20Poly1305,
            kdf: KdfParams {
                m_cost: 8,
                t_cost: 1,
                p_cost: 1,
            },
            network: AVALANCHE_FUJI,
            ..VaultConfig::default()
        };
        let mut app = AppController::from_config(&config);
        app.import_private_key(KEY_ONE, "secret1", "secret1").await.unwrap();
        assert_eq!(app.session().unwrap().network().chain_id, 43113);

        app.lock();
        assert!(matches!(
            app.unlock("secret2").await,
            Err(VaultError::AuthenticationFailed)
        ));
        assert!(app.unlock("secret1").await.is_ok());
    }

    #[test]
    fn test_session_debug_hides_key() {
        let session = Session::new(Zeroizing::new(KEY_ONE.to_string()), Network::default()).unwrap();
        let printed = format!("{:?}", session);
        assert!(printed.contains("0x7E5F"));
        assert!(!printed.contains(KEY_ONE));
    }
}
