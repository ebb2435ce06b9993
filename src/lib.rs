//! Wallet Vault
//!
//! Password-protected storage for an Avalanche C-Chain wallet: the private key and recovery
//! phrase are encrypted under a user password and kept in the OS keychain (or a file).
//! `session::AppController` drives the create / import / unlock / lock lifecycle on top.

pub mod config;
pub mod error;
pub mod models;
pub mod password_change;
pub mod quiz;
pub mod refresh;
pub mod secrets;
pub mod session;
pub mod wallet;

pub use config::VaultConfig;
pub use error::{ErrorReport, Result, VaultError};
pub use session::{AppController, AuthState, Session};

