//! Password-based symmetric ciphers
//!
//! Two text formats, both base64 encoded:
//!
//! CryptoJS / OpenSSL passphrase format (default):
//! - magic: `Salted__` (8 bytes)
//! - salt: 8 bytes
//! - ciphertext: AES-256-CBC with PKCS#7 padding
//! - key + IV: `EVP_BytesToKey(MD5, 1 round)` over password and salt
//!
//! Sealed AEAD format (opt-in):
//! - magic: `WVXC20P2` (8 bytes)
//! - Argon2id `m_cost`, `t_cost`, `p_cost`: u32 little-endian each
//! - salt: 16 bytes (Argon2id)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD output (= ciphertext + tag), everything before it bound as AAD
//!
//! The KDF cost is read back from the header, so changing the configured cost only
//! affects newly sealed values. `WVXC20P1` blobs (no cost fields, magic as AAD) are
//! still read with the configured cost.
//!
//! `decrypt` returns an empty buffer for a wrong password in both formats. Callers treat
//! an empty (or non-UTF-8) plaintext as an authentication failure.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// OpenSSL salted header
pub const OPENSSL_MAGIC: &[u8; 8] = b"Salted__";
const OPENSSL_SALT_LEN: usize = 8;
const AES_KEY_LEN: usize = 32;
const AES_IV_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;

/// Sealed AEAD header
pub const AEAD_MAGIC: &[u8; 8] = b"WVXC20P2";
/// Earlier sealed header without KDF cost fields
pub const AEAD_MAGIC_V1: &[u8; 8] = b"WVXC20P1";
const AEAD_PARAMS_LEN: usize = 12;
const AEAD_SALT_LEN: usize = 16;
const AEAD_NONCE_LEN: usize = 24;
const AEAD_KEY_LEN: usize = 32;
const AEAD_TAG_LEN: usize = 16;

/// Symmetric cipher collaborator used by the vault
pub trait SymmetricCipher: Send + Sync {
    /// Encrypt text under a password, producing printable ciphertext
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;

    /// Decrypt ciphertext under a password
    ///
    /// An empty result means the password was wrong. Structurally invalid ciphertext is
    /// reported as [`VaultError::MalformedBundle`].
    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<Zeroizing<Vec<u8>>>;

    /// Short identifier for logs
    fn name(&self) -> &'static str;
}

/// Available cipher implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    CryptoJsAes,
    XChaCha20Poly1305,
}

impl CipherKind {
    pub fn build(self, kdf: KdfParams) -> Arc<dyn SymmetricCipher> {
        match self {
            CipherKind::CryptoJsAes => Arc::new(CryptoJsAes),
            CipherKind::XChaCha20Poly1305 => Arc::new(SealedAead::new(kdf)),
        }
    }
}

impl FromStr for CipherKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cryptojs-aes" | "aes" | "legacy" => Ok(CipherKind::CryptoJsAes),
            "xchacha20poly1305" | "xchacha" | "aead" => Ok(CipherKind::XChaCha20Poly1305),
            other => Err(VaultError::Config(format!("unknown cipher: {}", other))),
        }
    }
}

// =====================================
// CryptoJS-compatible AES
// =====================================

/// AES-256-CBC in the CryptoJS passphrase format
///
/// Reads and writes the same blobs as `CryptoJS.AES.encrypt(text, password).toString()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoJsAes;

impl CryptoJsAes {
    fn encrypt_with_salt(
        &self,
        plaintext: &str,
        password: &str,
        salt: &[u8; OPENSSL_SALT_LEN],
    ) -> Result<String> {
        let derived = evp_bytes_to_key(password.as_bytes(), salt);
        let (key, iv) = derived.split_at(AES_KEY_LEN);

        let encryptor = Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|e| VaultError::Cipher(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut blob = Vec::with_capacity(OPENSSL_MAGIC.len() + salt.len() + ciphertext.len());
        blob.extend_from_slice(OPENSSL_MAGIC);
        blob.extend_from_slice(salt);
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(blob))
    }
}

impl SymmetricCipher for CryptoJsAes {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let mut salt = [0u8; OPENSSL_SALT_LEN];
        rand::thread_rng().fill(&mut salt);
        self.encrypt_with_salt(plaintext, password, &salt)
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::MalformedBundle(format!("ciphertext is not base64: {}", e)))?;

        let header_len = OPENSSL_MAGIC.len() + OPENSSL_SALT_LEN;
        if raw.len() < header_len || &raw[..OPENSSL_MAGIC.len()] != OPENSSL_MAGIC {
            return Err(VaultError::MalformedBundle(
                "ciphertext is missing the salted header".to_string(),
            ));
        }

        let body = &raw[header_len..];
        if body.is_empty() || body.len() % AES_BLOCK_LEN != 0 {
            return Err(VaultError::MalformedBundle(format!(
                "ciphertext length {} is not a whole number of blocks",
                body.len()
            )));
        }

        let mut salt = [0u8; OPENSSL_SALT_LEN];
        salt.copy_from_slice(&raw[OPENSSL_MAGIC.len()..header_len]);

        let derived = evp_bytes_to_key(password.as_bytes(), &salt);
        let (key, iv) = derived.split_at(AES_KEY_LEN);
        let decryptor = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| VaultError::Cipher(e.to_string()))?;

        // Bad padding is what a wrong password looks like
        match decryptor.decrypt_padded_vec_mut::<Pkcs7>(body) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(_) => Ok(Zeroizing::new(Vec::new())),
        }
    }

    fn name(&self) -> &'static str {
        "cryptojs-aes"
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single round
fn evp_bytes_to_key(
    password: &[u8],
    salt: &[u8; OPENSSL_SALT_LEN],
) -> Zeroizing<[u8; AES_KEY_LEN + AES_IV_LEN]> {
    let mut out = Zeroizing::new([0u8; AES_KEY_LEN + AES_IV_LEN]);
    let mut previous: Option<md5::Digest> = None;
    let mut filled = 0;

    while filled < out.len() {
        let mut ctx = md5::Context::new();
        if let Some(digest) = previous {
            ctx.consume(digest.0);
        }
        ctx.consume(password);
        ctx.consume(salt);
        let digest = ctx.compute();

        let take = (out.len() - filled).min(digest.0.len());
        out[filled..filled + take].copy_from_slice(&digest.0[..take]);
        filled += take;
        previous = Some(digest);
    }

    out
}

// =====================================
// Sealed AEAD (XChaCha20-Poly1305 + Argon2id)
// =====================================

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65_536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    fn to_le_bytes(self) -> [u8; AEAD_PARAMS_LEN] {
        let mut out = [0u8; AEAD_PARAMS_LEN];
        out[..4].copy_from_slice(&self.m_cost.to_le_bytes());
        out[4..8].copy_from_slice(&self.t_cost.to_le_bytes());
        out[8..].copy_from_slice(&self.p_cost.to_le_bytes());
        out
    }

    fn from_le_bytes(bytes: &[u8; AEAD_PARAMS_LEN]) -> Self {
        let word =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            m_cost: word(0),
            t_cost: word(4),
            p_cost: word(8),
        }
    }
}

/// Views into a decoded sealed blob
struct SealedParts<'a> {
    kdf: KdfParams,
    salt: &'a [u8],
    nonce: &'a [u8],
    aad: &'a [u8],
    body: &'a [u8],
}

/// Integrity-checked password cipher
///
/// The configured `KdfParams` are used when sealing; opening uses the cost stored in
/// the blob.
#[derive(Debug, Clone)]
pub struct SealedAead {
    kdf: KdfParams,
}

impl SealedAead {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    fn derive_key(
        kdf: KdfParams,
        password: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; AEAD_KEY_LEN]>> {
        let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(AEAD_KEY_LEN))
            .map_err(|e| VaultError::Config(format!("invalid Argon2 parameters: {}", e)))?;

        let mut key = Zeroizing::new([0u8; AEAD_KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| VaultError::Cipher(e.to_string()))?;

        Ok(key)
    }

    fn parse<'a>(&self, raw: &'a [u8]) -> Result<SealedParts<'a>> {
        let magic_len = AEAD_MAGIC.len();
        let (kdf, params_end) = if raw.len() >= magic_len && &raw[..magic_len] == AEAD_MAGIC {
            let params_end = magic_len + AEAD_PARAMS_LEN;
            let mut params = [0u8; AEAD_PARAMS_LEN];
            if raw.len() < params_end {
                return Err(VaultError::MalformedBundle(
                    "sealed AEAD header is truncated".to_string(),
                ));
            }
            params.copy_from_slice(&raw[magic_len..params_end]);
            (KdfParams::from_le_bytes(&params), params_end)
        } else if raw.len() >= magic_len && &raw[..magic_len] == AEAD_MAGIC_V1 {
            (self.kdf, magic_len)
        } else {
            return Err(VaultError::MalformedBundle(
                "ciphertext is not a sealed AEAD blob".to_string(),
            ));
        };

        let salt_end = params_end + AEAD_SALT_LEN;
        let nonce_end = salt_end + AEAD_NONCE_LEN;
        if raw.len() < nonce_end + AEAD_TAG_LEN {
            return Err(VaultError::MalformedBundle(
                "sealed AEAD blob is truncated".to_string(),
            ));
        }

        // v1 bound only the magic; v2 binds the whole header
        let aad = if params_end == magic_len {
            &raw[..magic_len]
        } else {
            &raw[..nonce_end]
        };

        Ok(SealedParts {
            kdf,
            salt: &raw[params_end..salt_end],
            nonce: &raw[salt_end..nonce_end],
            aad,
            body: &raw[nonce_end..],
        })
    }
}

impl SymmetricCipher for SealedAead {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; AEAD_SALT_LEN];
        let mut nonce = [0u8; AEAD_NONCE_LEN];
        rng.fill(&mut salt);
        rng.fill(&mut nonce);

        let key = Self::derive_key(self.kdf, password, &salt)?;
        let key_bytes: &[u8; AEAD_KEY_LEN] = &key;
        let cipher = XChaCha20Poly1305::new(key_bytes.into());

        let header_len = AEAD_MAGIC.len() + AEAD_PARAMS_LEN + salt.len() + nonce.len();
        let mut blob = Vec::with_capacity(header_len + plaintext.len() + AEAD_TAG_LEN);
        blob.extend_from_slice(AEAD_MAGIC);
        blob.extend_from_slice(&self.kdf.to_le_bytes());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);

        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &blob,
                },
            )
            .map_err(|e| VaultError::Cipher(e.to_string()))?;
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(blob))
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::MalformedBundle(format!("ciphertext is not base64: {}", e)))?;

        let parts = self.parse(&raw)?;

        // Cost fields come from storage; out-of-range values mean a damaged blob
        let key = Self::derive_key(parts.kdf, password, parts.salt).map_err(|e| match e {
            VaultError::Config(reason) => VaultError::MalformedBundle(reason),
            other => other,
        })?;
        let key_bytes: &[u8; AEAD_KEY_LEN] = &key;
        let cipher = XChaCha20Poly1305::new(key_bytes.into());

        // Tag mismatch maps to the same empty-output contract as the CBC cipher
        let payload = Payload {
            msg: parts.body,
            aad: parts.aad,
        };
        match cipher.decrypt(XNonce::from_slice(parts.nonce), payload) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(_) => Ok(Zeroizing::new(Vec::new())),
        }
    }

    fn name(&self) -> &'static str {
        "xchacha20poly1305"
    }
}
