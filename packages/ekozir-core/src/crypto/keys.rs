//! # Key Management
//!
//! P-256 key pairs for ECDH, in two flavours:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           KEY TYPES                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Password key pair (long-lived identity)                               │
//! │  ─────────────────────────────────────────                              │
//! │  • KeyPair::from_password()                                            │
//! │  • Deterministic: same password → bit-identical key pair               │
//! │  • Never persisted; recomputed every session                           │
//! │  • Public half published as a PublicKeyRecord                          │
//! │                                                                         │
//! │  Ephemeral key pair (one per envelope)                                 │
//! │  ─────────────────────────────────────────                              │
//! │  • KeyPair::generate()                                                 │
//! │  • Random, used for exactly one ECDH, then dropped                     │
//! │  • Public half travels inside the envelope                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use p256::elliptic_curve::bigint::U256;
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{ecdh, EncodedPoint, FieldBytes, NonZeroScalar, PublicKey, Scalar, SecretKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};
use crate::identity::PublicKeyRecord;

use super::kdf;

/// Size of one affine coordinate in bytes
pub const COORDINATE_SIZE: usize = 32;

/// An ECDH key pair on NIST P-256
///
/// The secret scalar is zeroized by `p256` when dropped.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Derive the deterministic key pair for a password
    ///
    /// ## Process
    ///
    /// ```text
    /// password ──► PBKDF2 seed ──► HKDF scalar bytes ──► mod n ──► d
    ///                                                     Q = d·G
    /// ```
    ///
    /// Costs one 100,000-round PBKDF2; derive once per session and keep the
    /// result (see [`crate::Session`]).
    pub fn from_password(password: &str) -> Result<Self> {
        super::ensure_available()?;

        let seed = kdf::derive_seed(password);
        let mut scalar = kdf::derive_private_scalar(&seed)?;
        let keys = Self::from_private_bytes(&scalar);
        scalar.zeroize();

        keys
    }

    /// Build a key pair from 32 big-endian bytes, reduced modulo the group order
    ///
    /// Fails only if the reduced scalar is zero.
    pub fn from_private_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let scalar = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(bytes));
        let scalar: Option<NonZeroScalar> = NonZeroScalar::new(scalar).into();
        let scalar = scalar
            .ok_or_else(|| Error::KeyDerivationFailed("private scalar reduced to zero".into()))?;

        let secret = SecretKey::from(scalar);
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the private scalar as 32 big-endian bytes
    ///
    /// Only for comparisons in tests and diagnostics. Never log or transmit.
    pub fn private_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Get the public point
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Get the affine (x, y) coordinates of the public point
    pub fn public_coordinates(&self) -> ([u8; COORDINATE_SIZE], [u8; COORDINATE_SIZE]) {
        coordinates(&self.public)
    }

    /// Get the canonical public key record for registration and lookup
    pub fn public_key_record(&self) -> PublicKeyRecord {
        let (x, y) = self.public_coordinates();
        PublicKeyRecord::from_coordinates(&x, &y)
    }

    /// Perform ECDH with another party's public key
    ///
    /// Returns the x-coordinate of the shared point. Both sides compute the
    /// same value:
    /// - sender: ephemeral_secret × recipient_public
    /// - recipient: recipient_secret × ephemeral_public
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> Zeroizing<[u8; 32]> {
        let shared = ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), their_public.as_affine());

        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes());
        out
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (x, _) = self.public_coordinates();
        f.debug_struct("KeyPair")
            .field("public_x", &hex::encode(&x[..8]))
            .finish_non_exhaustive()
    }
}

/// Split a public point into its affine coordinates
pub(crate) fn coordinates(public: &PublicKey) -> ([u8; COORDINATE_SIZE], [u8; COORDINATE_SIZE]) {
    // Uncompressed SEC1: 0x04 || x || y
    let encoded = public.to_encoded_point(false);
    let bytes = encoded.as_bytes();

    let mut x = [0u8; COORDINATE_SIZE];
    let mut y = [0u8; COORDINATE_SIZE];
    x.copy_from_slice(&bytes[1..1 + COORDINATE_SIZE]);
    y.copy_from_slice(&bytes[1 + COORDINATE_SIZE..1 + 2 * COORDINATE_SIZE]);
    (x, y)
}

/// Rebuild a public point from affine coordinates
///
/// Rejects points that are not on the curve.
pub(crate) fn public_key_from_coordinates(
    x: &[u8; COORDINATE_SIZE],
    y: &[u8; COORDINATE_SIZE],
) -> Result<PublicKey> {
    let point = EncodedPoint::from_affine_coordinates(
        &FieldBytes::from(*x),
        &FieldBytes::from(*y),
        false,
    );

    let public: Option<PublicKey> = PublicKey::from_encoded_point(&point).into();
    public.ok_or_else(|| Error::InvalidKeyFormat("point is not on curve P-256".into()))
}

// ============================================================================
// TESTS
// ============================================================================
