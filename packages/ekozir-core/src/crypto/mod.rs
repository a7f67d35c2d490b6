//! # Cryptography Module
//!
//! This module provides the cryptographic primitives behind Ekozir's hybrid
//! messaging scheme.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  KEY HIERARCHY                                                         │
//! │  ─────────────                                                          │
//! │                                                                         │
//! │  Password ──PBKDF2──► Seed ──HKDF──► P-256 private scalar              │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                                  Public point (published)               │
//! │                                                                         │
//! │  HYBRID SCHEME                                                         │
//! │  ─────────────                                                          │
//! │                                                                         │
//! │  1. One-time content key K (random, AES-256)                           │
//! │  2. Body: AES-GCM(K, random IV, message), once per message             │
//! │  3. For each recipient R (and the sender):                             │
//! │     ephemeral e ──ECDH(e, R)──► HKDF ──► wrapping key W                │
//! │     envelope = AES-GCM(W, random IV, base64(K))                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | PBKDF2-HMAC-SHA256 | Password stretching (100,000 rounds) |
//! | HKDF-SHA256 | Scalar derivation, wrapping-key derivation |
//! | ECDH P-256 | Per-envelope key agreement |
//! | AES-256-GCM | Envelope payload and message body |
//!
//! ## Capability Check
//!
//! [`ensure_available`] runs a known-answer self-test of the curve and the
//! AEAD once per process. Every password derivation goes through it, so a
//! broken backend surfaces as `LibraryUnavailable` before any key material
//! is touched.

mod encryption;
mod kdf;
mod keys;

pub use encryption::{decrypt, encrypt, EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_private_scalar, derive_seed, derive_wrapping_key, domain, Seed, SEED_SIZE};
pub use keys::{KeyPair, COORDINATE_SIZE};

#[cfg(test)]
pub(crate) use encryption::encrypt_with_nonce;
pub(crate) use keys::public_key_from_coordinates;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

/// Affine coordinates of the P-256 base point, big-endian
const GENERATOR_X: [u8; 32] = [
    0x6b, 0x17, 0xd1, 0xf2, 0xe1, 0x2c, 0x42, 0x47, 0xf8, 0xbc, 0xe6, 0xe5, 0x63, 0xa4, 0x40, 0xf2,
    0x77, 0x03, 0x7d, 0x81, 0x2d, 0xeb, 0x33, 0xa0, 0xf4, 0xa1, 0x39, 0x45, 0xd8, 0x98, 0xc2, 0x96,
];
const GENERATOR_Y: [u8; 32] = [
    0x4f, 0xe3, 0x42, 0xe2, 0xfe, 0x1a, 0x7f, 0x9b, 0x8e, 0xe7, 0xeb, 0x4a, 0x7c, 0x0f, 0x9e, 0x16,
    0x2b, 0xce, 0x33, 0x57, 0x6b, 0x31, 0x5e, 0xce, 0xcb, 0xb6, 0x40, 0x68, 0x37, 0xbf, 0x51, 0xf5,
];

/// Outcome of the one-time self-test
static CAPABILITY: OnceCell<std::result::Result<(), String>> = OnceCell::new();

/// Check that the curve and AEAD backends work, running the self-test once
///
/// ## Errors
///
/// `LibraryUnavailable` if the self-test failed. The failure is cached;
/// later calls fail the same way without re-running it.
pub fn ensure_available() -> Result<()> {
    CAPABILITY
        .get_or_init(self_test)
        .clone()
        .map_err(Error::LibraryUnavailable)
}

fn self_test() -> std::result::Result<(), String> {
    let mut one = [0u8; 32];
    one[31] = 1;

    let keys = KeyPair::from_private_bytes(&one).map_err(|e| format!("P-256: {}", e))?;
    let (x, y) = keys.public_coordinates();
    if x != GENERATOR_X || y != GENERATOR_Y {
        return Err("P-256: 1·G does not match the base point".into());
    }

    let key = EncryptionKey::from_bytes([0u8; KEY_SIZE]);
    let (nonce, ciphertext) =
        encrypt(&key, b"self-test").map_err(|e| format!("AES-GCM: {}", e))?;
    let plaintext =
        decrypt(&key, &nonce, &ciphertext).map_err(|e| format!("AES-GCM: {}", e))?;
    if plaintext != b"self-test" {
        return Err("AES-GCM: round trip mismatch".into());
    }

    tracing::debug!("Cryptographic self-test passed");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
