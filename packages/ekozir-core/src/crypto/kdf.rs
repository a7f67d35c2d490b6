//! # Key Derivation Functions
//!
//! Turns a password into key material, and an ECDH shared secret into a
//! content-wrapping key.
//!
//! ## Password → Private Scalar
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    PASSWORD KEY DERIVATION                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Password (UTF-8)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PBKDF2-HMAC-SHA256(salt="KEY_DERIVATION_SALT_v1", 100,000 rounds)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Seed (32 bytes)                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  HKDF-SHA256(salt="ECDH_KEY_SALT_DETERMINISTIC_v1",                    │
//! │              info="ECDH-P256-PrivateKey")                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Private scalar bytes (32 bytes, reduced mod n by `crypto::keys`)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shared Secret → Wrapping Key
//!
//! ```text
//! ECDH x-coordinate (32 bytes)
//!       │
//!       └──► HKDF-SHA256(salt="ECDH-AES-KEY-SALT", info="ECDH-AES-256-GCM-Key")
//!                 │
//!                 ▼
//!            AES-256-GCM key
//! ```
//!
//! Sender and recipient run the second derivation with identical constants;
//! that symmetry is what lets the recipient reopen an envelope.
//!
//! ## Compatibility
//!
//! | Constant | Value |
//! |----------|-------|
//! | Seed salt | `KEY_DERIVATION_SALT_v1` |
//! | Seed rounds | 100,000 |
//! | Scalar salt / info | `ECDH_KEY_SALT_DETERMINISTIC_v1` / `ECDH-P256-PrivateKey` |
//! | Wrap salt / info | `ECDH-AES-KEY-SALT` / `ECDH-AES-256-GCM-Key` |
//!
//! These are application-wide, not per-deployment. Changing any of them
//! changes every user's key pair.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

use super::encryption::{EncryptionKey, KEY_SIZE};

/// Size of the password seed in bytes (256 bits)
pub const SEED_SIZE: usize = 32;

/// Fixed derivation constants
pub mod domain {
    /// PBKDF2 salt for the password seed
    pub const SEED_SALT: &[u8] = b"KEY_DERIVATION_SALT_v1";

    /// PBKDF2 iteration count for the password seed
    pub const SEED_ITERATIONS: u32 = 100_000;

    /// HKDF salt for the private scalar
    pub const PRIVATE_KEY_SALT: &[u8] = b"ECDH_KEY_SALT_DETERMINISTIC_v1";

    /// HKDF info for the private scalar
    pub const PRIVATE_KEY_INFO: &[u8] = b"ECDH-P256-PrivateKey";

    /// HKDF salt for the envelope wrapping key
    pub const WRAPPING_KEY_SALT: &[u8] = b"ECDH-AES-KEY-SALT";

    /// HKDF info for the envelope wrapping key
    pub const WRAPPING_KEY_INFO: &[u8] = b"ECDH-AES-256-GCM-Key";
}

/// Deterministic seed stretched from a password
///
/// Zeroized when dropped. Never leaves the key derivation path without
/// going through [`derive_private_scalar`] first.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    /// Get the raw seed bytes
    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

/// Stretch a password into a 256-bit seed with PBKDF2-HMAC-SHA256
///
/// Deterministic: identical passwords give identical seeds. Any string is
/// accepted, including the empty string; password policy lives in
/// [`crate::identity::validate_password`].
pub fn derive_seed(password: &str) -> Seed {
    let mut seed = [0u8; SEED_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        domain::SEED_SALT,
        domain::SEED_ITERATIONS,
        &mut seed,
    );
    Seed(seed)
}

/// Expand a seed into the 256-bit private scalar candidate
///
/// The bytes are not yet guaranteed to be a valid P-256 scalar; reduction
/// happens in [`crate::crypto::KeyPair::from_private_bytes`].
pub fn derive_private_scalar(seed: &Seed) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(domain::PRIVATE_KEY_SALT), seed.as_bytes());

    let mut scalar = [0u8; 32];
    hkdf.expand(domain::PRIVATE_KEY_INFO, &mut scalar)
        .map_err(|_| Error::KeyDerivationFailed("Failed to derive private scalar".into()))?;

    Ok(scalar)
}

/// Derive the AES-256-GCM key that wraps an envelope payload
///
/// `shared_secret` is the raw ECDH output (the x-coordinate of the shared
/// point). Used identically on the encrypt and decrypt side.
pub fn derive_wrapping_key(shared_secret: &[u8]) -> Result<EncryptionKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(domain::WRAPPING_KEY_SALT), shared_secret);

    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(domain::WRAPPING_KEY_INFO, &mut key)
        .map_err(|_| Error::KeyDerivationFailed("Failed to derive wrapping key".into()))?;

    let wrapping_key = EncryptionKey::from_bytes(key);
    key.zeroize();
    Ok(wrapping_key)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_known_answer() {
        let seed = derive_seed("Abcdefgh123!");
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "53ad40c3b0d115dbdf6b199918090efaee6943077ced510e4dd3156350b2a253"
        );
    }

    #[test]
    fn test_private_scalar_known_answer() {
        let seed = derive_seed("Abcdefgh123!");
        let scalar = derive_private_scalar(&seed).unwrap();
        assert_eq!(
            hex::encode(scalar),
            "cf4fcb4816afce073368d15366f45ea6b4ae165ebabd5ff5c6f14341bf914909"
        );
    }

    #[test]
    fn test_seed_deterministic() {
        let seed1 = derive_seed("Correct-Horse-42");
        let seed2 = derive_seed("Correct-Horse-42");
        assert_eq!(seed1.as_bytes(), seed2.as_bytes());
    }

    #[test]
    fn test_different_passwords_different_seeds() {
        let seed1 = derive_seed("Correct-Horse-42");
        let seed2 = derive_seed("Correct-Horse-43");
        assert_ne!(seed1.as_bytes(), seed2.as_bytes());
    }

    #[test]
    fn test_empty_password_is_accepted() {
        let seed = derive_seed("");
        assert_ne!(seed.as_bytes(), &[0u8; SEED_SIZE]);
    }

    #[test]
    fn test_wrapping_key_deterministic() {
        let shared = [42u8; 32];

        let key1 = derive_wrapping_key(&shared).unwrap();
        let key2 = derive_wrapping_key(&shared).unwrap();

        assert_eq!(key1.as_inner(), key2.as_inner());
    }

    #[test]
    fn test_wrapping_key_differs_from_scalar_derivation() {
        // Same input material, different salt/info: the two derivations
        // must not collide.
        let material = [7u8; 32];
        let seed = Seed(material);

        let scalar = derive_private_scalar(&seed).unwrap();
        let wrapping = derive_wrapping_key(&material).unwrap();

        assert_ne!(scalar, wrapping.as_inner());
    }
}
