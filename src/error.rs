//! Wallet Vault Error Types
//!
//! Library-wide error taxonomy and the serializable report handed to front ends.

use serde::Serialize;
use thiserror::Error;

/// Wallet vault error
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed credential bundle: {0}")]
    MalformedBundle(String),

    #[error("Authentication failed: wrong password")]
    AuthenticationFailed,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("No wallet found in secure storage")]
    NoWallet,

    #[error("No recovery phrase is stored for this wallet")]
    MnemonicUnavailable,

    #[error("Wallet is locked")]
    Locked,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cipher failure: {0}")]
    Cipher(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            VaultError::MalformedBundle(_) => "MALFORMED_BUNDLE",
            VaultError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            VaultError::ValidationFailed(_) => "VALIDATION_FAILED",
            VaultError::NoWallet => "NO_WALLET",
            VaultError::MnemonicUnavailable => "MNEMONIC_UNAVAILABLE",
            VaultError::Locked => "LOCKED",
            VaultError::InvalidState(_) => "INVALID_STATE",
            VaultError::Cipher(_) => "CIPHER_ERROR",
            VaultError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The user can retry with different input without any other action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailed | VaultError::ValidationFailed(_)
        )
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            VaultError::StorageUnavailable(_) => {
                "Secure storage could not be accessed. Please try again.".to_string()
            }
            VaultError::MalformedBundle(_) => {
                "Saved wallet data is corrupted. Create a new wallet or import an existing one."
                    .to_string()
            }
            VaultError::AuthenticationFailed => {
                "The password is incorrect. Please try again.".to_string()
            }
            VaultError::ValidationFailed(reason) => reason.clone(),
            VaultError::NoWallet => {
                "No saved wallet was found. Create a new wallet or import an existing one."
                    .to_string()
            }
            VaultError::MnemonicUnavailable => {
                "This wallet has no saved recovery phrase.".to_string()
            }
            VaultError::Locked => "Unlock the wallet first.".to_string(),
            VaultError::InvalidState(_) => "Please start this step again.".to_string(),
            VaultError::Cipher(_) => "An unexpected encryption error occurred.".to_string(),
            VaultError::Config(reason) => format!("Invalid configuration: {}", reason),
        }
    }
}

/// Serializable error for front ends
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<VaultError> for ErrorReport {
    fn from(error: VaultError) -> Self {
        // Internal detail only for variants that carry a technical cause
        let details = match &error {
            VaultError::StorageUnavailable(d)
            | VaultError::MalformedBundle(d)
            | VaultError::InvalidState(d)
            | VaultError::Cipher(d) => Some(d.clone()),
            _ => None,
        };

        ErrorReport {
            code: error.code().to_string(),
            message: error.user_message(),
            details,
        }
    }
}

/// Library result type
pub type Result<T> = std::result::Result<T, VaultError>;
