// src/services/vault.rs
//! Credential vault: authenticated symmetric encryption for provider tokens
//! before they touch the database.
//!
//! AES-256-GCM with a fresh random 12-byte nonce per call; output is
//! base64(nonce || ciphertext). The key is process-wide configuration loaded
//! once at startup; a missing key aborts startup rather than failing per call.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption key not configured")]
    KeyNotConfigured,

    #[error("invalid encryption key format")]
    InvalidKeyFormat,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid encrypted data format")]
    InvalidDataFormat,
}

pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("cipher", &"<redacted>")
            .finish()
    }
}

impl TokenVault {
    /// Initialize the vault from a base64-encoded 32-byte key string
    pub fn from_key(key_str: &str) -> Result<Self, VaultError> {
        if key_str.is_empty() {
            return Err(VaultError::KeyNotConfigured);
        }

        let key_bytes = BASE64
            .decode(key_str.as_bytes())
            .map_err(|_| VaultError::InvalidKeyFormat)?;

        // AES-256 requires exactly 32 bytes
        if key_bytes.len() != 32 {
            return Err(VaultError::InvalidKeyFormat);
        }

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        let cipher = Aes256Gcm::new(key);

        Ok(Self { cipher })
    }

    /// Generate a new random encryption key (base64-encoded)
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Encrypt a plaintext string, returning base64(nonce || ciphertext).
    /// Empty plaintext passes through as empty: absent tokens never hit the
    /// cipher.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to plaintext.
    /// Empty input passes through as empty.
    pub fn decrypt(&self, encrypted: &str) -> Result<String, VaultError> {
        if encrypted.is_empty() {
            return Ok(String::new());
        }

        let combined = BASE64
            .decode(encrypted.as_bytes())
            .map_err(|_| VaultError::InvalidDataFormat)?;

        if combined.len() < 12 {
            return Err(VaultError::InvalidDataFormat);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext_bytes).map_err(|_| VaultError::DecryptionFailed)
    }
}
