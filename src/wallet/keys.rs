//! secp256k1 private keys and EIP-55 addresses

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

const PRIVATE_KEY_LEN: usize = 32;

/// Parse user-supplied private key hex into the canonical `0x` lowercase form
///
/// Accepts input with or without the `0x` prefix. The scalar must be non-zero and below
/// the curve order.
pub fn parse_private_key(input: &str) -> Result<Zeroizing<String>> {
    let signing_key = signing_key_from_hex(input)?;
    Ok(encode_private_key(&signing_key))
}

/// Checksummed address for a private key
pub fn address_from_private_key(private_key: &str) -> Result<String> {
    let signing_key = signing_key_from_hex(private_key)?;
    Ok(address_from_signing_key(&signing_key))
}

pub(crate) fn encode_private_key(signing_key: &SigningKey) -> Zeroizing<String> {
    let bytes: Zeroizing<[u8; PRIVATE_KEY_LEN]> = Zeroizing::new(signing_key.to_bytes().into());
    Zeroizing::new(format!("0x{}", hex::encode(&*bytes)))
}

fn signing_key_from_hex(input: &str) -> Result<SigningKey> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != PRIVATE_KEY_LEN * 2 {
        return Err(VaultError::ValidationFailed(
            "Invalid private key: expected 64 hex characters.".to_string(),
        ));
    }

    let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| {
        VaultError::ValidationFailed("Invalid private key: not hexadecimal.".to_string())
    })?);

    SigningKey::from_slice(&bytes).map_err(|_| {
        VaultError::ValidationFailed("Invalid private key: out of range.".to_string())
    })
}

fn address_from_signing_key(signing_key: &SigningKey) -> String {
    let point = signing_key.verifying_key().to_encoded_point(false);
    // Drop the 0x04 uncompressed prefix
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    to_checksum_address(&hash[12..])
}

/// EIP-55 mixed-case encoding of a 20-byte address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
