//! Secret handling
//!
//! - `cipher`: password-based encryption of individual fields
//! - `store`: where the sealed bundle lives (OS keychain, file, memory)
//! - `vault`: seals, stores and unseals the wallet credentials

pub mod cipher;
pub mod store;
pub mod vault;

pub use cipher::{CipherKind, CryptoJsAes, KdfParams, SealedAead, SymmetricCipher};
pub use store::{FileStore, KeyringStore, MemoryStore, SecureStore, StoreBackend};
pub use vault::{CredentialVault, UnsealedSecrets};
