//! Authenticated encryption for stored calendar refresh tokens (AES-256-GCM).
//!
//! Blob format: `hex(nonce || ciphertext)` with a fresh 96-bit nonce per encryption.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("token_encryption_key must be 64 hex characters (32 bytes)")]
    InvalidKey,
    #[error("encryption failed")]
    Encrypt,
}

/// Symmetric cipher for refresh tokens at rest.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher { .. }")
    }
}

impl TokenCipher {
    /// Builds a cipher from a 64-character hex key.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| CipherError::InvalidKey)?;
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey);
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generates a random key, hex encoded. Used by `--generate-key`.
    pub fn generate_hex_key() -> String {
        hex::encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(hex::encode(combined))
    }

    /// Decrypts a stored blob. Returns `None` for malformed, tampered, foreign-key or empty tokens.
    pub fn decrypt(&self, blob: &str) -> Option<String> {
        let combined = hex::decode(blob.trim()).ok()?;
        if combined.len() <= NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok().filter(|s| !s.is_empty())
    }
}
