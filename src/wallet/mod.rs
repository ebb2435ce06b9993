//! Wallet key material
//!
//! Validation and derivation for the secrets the vault protects. Everything here runs
//! before anything is written to secure storage.

pub mod keys;
pub mod mnemonic;

pub use keys::{address_from_private_key, parse_private_key};
pub use mnemonic::{
    generate_mnemonic, parse_mnemonic, private_key_from_mnemonic, DEFAULT_WORD_COUNT,
};
