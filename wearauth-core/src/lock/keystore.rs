//! Secure key storage collaborator for the lock password.
//!
//! Mirrors a platform key store: callers hand plaintext in and get
//! `(ciphertext, iv)` back, and never see the key itself. On-device builds
//! implement `SecretKeyStore` over the hardware-backed store; the software
//! implementation here keeps the key in process memory and is what tests
//! use.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors from the encrypt/decrypt capability.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Opaque encrypt/decrypt capability backed by a non-extractable key.
pub trait SecretKeyStore: Send + Sync {
    /// Encrypt, returning `(ciphertext, iv)`. A fresh random IV is generated
    /// per call and must be stored alongside the ciphertext.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<(Vec<u8>, Vec<u8>)>;

    /// Decrypt a `(ciphertext, iv)` pair produced by `encrypt`.
    fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// AES-256-GCM key store holding the key in process memory.
pub struct SoftwareKeyStore {
    key: [u8; 32],
}

impl SoftwareKeyStore {
    /// Generate a store with a fresh random key.
    pub fn new() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self { key: key.into() }
    }

    /// Build a store over existing key material, e.g. a key unwrapped from a
    /// platform store.
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SoftwareKeyStore {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl SecretKeyStore for SoftwareKeyStore {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
        let cipher = Aes256Gcm::new(&self.key.into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

        Ok((ciphertext, nonce.to_vec()))
    }

    fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce: [u8; 12] = iv
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed("invalid IV length".to_string()))?;

        let cipher = Aes256Gcm::new(&self.key.into());
        cipher
            .decrypt(&Nonce::from(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}
