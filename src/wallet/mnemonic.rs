//! BIP-39 recovery phrases and BIP-44 Ethereum key derivation

use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use rand::Rng;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::wallet::keys::encode_private_key;

/// First account on the standard Ethereum path (also used by the C-Chain)
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Word count of phrases this wallet generates and imports
pub const DEFAULT_WORD_COUNT: usize = 12;

/// 128 bits of entropy -> 12 words
const ENTROPY_LEN: usize = 16;

/// Normalize and validate a recovery phrase
///
/// Whitespace is collapsed and words are lowercased. When `expected_words` is given the
/// phrase must have exactly that many words.
pub fn parse_mnemonic(phrase: &str, expected_words: Option<usize>) -> Result<Zeroizing<String>> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    );

    if normalized.is_empty() {
        return Err(VaultError::ValidationFailed(
            "Please enter your recovery phrase.".to_string(),
        ));
    }

    if let Some(expected) = expected_words {
        let count = normalized.split(' ').count();
        if count != expected {
            return Err(VaultError::ValidationFailed(format!(
                "The recovery phrase must have {} words, got {}.",
                expected, count
            )));
        }
    }

    Mnemonic::parse_in_normalized(Language::English, &normalized).map_err(|e| {
        VaultError::ValidationFailed(format!("Invalid recovery phrase: {}", e))
    })?;

    Ok(normalized)
}

/// Fresh 12-word English phrase
pub fn generate_mnemonic() -> Result<Zeroizing<String>> {
    let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
    rand::thread_rng().fill(&mut entropy[..]);

    phrase_from_entropy(&entropy[..])
}

fn phrase_from_entropy(entropy: &[u8]) -> Result<Zeroizing<String>> {
    let mnemonic = Mnemonic::from_entropy(entropy).map_err(|e| {
        VaultError::InvalidState(format!("cannot build a phrase from entropy: {}", e))
    })?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

fn derivation_path(path: &str) -> Result<DerivationPath> {
    path.parse().map_err(|e: bip32::Error| {
        VaultError::InvalidState(format!("bad derivation path '{}': {}", path, e))
    })
}

/// Derive the account private key for a phrase (empty BIP-39 passphrase)
pub fn private_key_from_mnemonic(phrase: &str) -> Result<Zeroizing<String>> {
    let normalized = parse_mnemonic(phrase, None)?;
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| VaultError::ValidationFailed(format!("Invalid recovery phrase: {}", e)))?;

    let seed = Zeroizing::new(mnemonic.to_seed(""));
    let path = derivation_path(ETH_DERIVATION_PATH)?;

    let xprv = XPrv::derive_from_path(&seed[..], &path)
        .map_err(|e| VaultError::ValidationFailed(format!("Key derivation failed: {}", e)))?;

    Ok(encode_private_key(xprv.private_key()))
}

/// English BIP-39 word list
pub fn english_word_list() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}
