//! # Encryption Module
//!
//! Provides AES-256-GCM encryption, used in two places:
//!
//! - wrapping a one-time content key inside a per-recipient envelope
//!   (key derived from ECDH + HKDF, see [`super::kdf::derive_wrapping_key`])
//! - encrypting the message body once under that one-time key
//!
//! ## Parameters
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | Key | 256 bits |
//! | Nonce | 96 bits, random per encryption |
//! | Tag | 128 bits, appended to the ciphertext |
//! | AAD | none |
//!
//! The tag check is enforced by `aes-gcm`; a wrong key never yields
//! plausible-looking plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// Always random. Never reuse a nonce with the same key: every
/// [`encrypt`] call draws a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting anything that is not 12 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM key
///
/// Used both for the one-time per-message content key and for the
/// HKDF-derived envelope wrapping key. Zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Import a key exported with [`EncryptionKey::to_base64`]
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(BASE64.decode(encoded.trim())?);
        let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            Error::MalformedInput(format!(
                "symmetric key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Export as standard base64
    ///
    /// This is the text that gets wrapped into each recipient envelope.
    /// Only hold on to it for as long as wrapping takes.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.0))
    }

    /// Get the raw key bytes
    pub fn as_inner(&self) -> [u8; KEY_SIZE] {
        self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Encrypt bytes using AES-256-GCM
///
/// ## Returns
///
/// Tuple of (nonce, ciphertext_with_tag)
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let ciphertext = encrypt_with_nonce(key, &nonce, plaintext)?;
    Ok((nonce, ciphertext))
}

/// Encrypt under a caller-chosen nonce
///
/// Only for known-answer tests; production paths go through [`encrypt`].
pub(crate) fn encrypt_with_nonce(
    key: &EncryptionKey,
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(AesNonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt bytes using AES-256-GCM
///
/// ## Errors
///
/// Returns `DecryptionFailed` if the key or nonce is wrong, or the
/// ciphertext was tampered with. The cases are not distinguished.
pub fn decrypt(key: &EncryptionKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| Error::DecryptionFailed)?;

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), ciphertext)
        .map_err(|_| {
            tracing::debug!("AES-GCM authentication tag mismatch");
            Error::DecryptionFailed
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let plaintext = b"Hello, group!";

        let (nonce, ciphertext) = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, ciphertext) = encrypt(&key, b"").unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, mut ciphertext) = encrypt(&key, b"Hello, group!").unwrap();
        ciphertext[0] ^= 0xFF;

        let result = decrypt(&key, &nonce, &ciphertext);
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = EncryptionKey::from_bytes([42u8; 32]);
        let key2 = EncryptionKey::from_bytes([99u8; 32]);

        let (nonce, ciphertext) = encrypt(&key1, b"secret").unwrap();
        let result = decrypt(&key2, &nonce, &ciphertext);

        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (n1, ct1) = encrypt(&key, b"same").unwrap();
        let (n2, ct2) = encrypt(&key, b"same").unwrap();

        assert_ne!(n1, n2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_key_base64_export_import() {
        let key = EncryptionKey::generate();
        let exported = key.to_base64();
        let imported = EncryptionKey::from_base64(&exported).unwrap();

        assert_eq!(key.as_inner(), imported.as_inner());
        assert_eq!(exported.len(), 44);
    }

    #[test]
    fn test_key_import_rejects_wrong_length() {
        let result = EncryptionKey::from_base64("AAECAwQFBgcICQoLDA0ODw==");
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_nonce_from_slice_length_checked() {
        assert!(Nonce::from_slice(&[0u8; 12]).is_some());
        assert!(Nonce::from_slice(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }
}
