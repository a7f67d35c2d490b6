//! # Envelope Encryption
//!
//! An envelope wraps a short secret (in practice the base64 text of a
//! one-time content key) for exactly one recipient public key.
//!
//! ## Wrap
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ENVELOPE WRAPPING                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. e ← fresh P-256 key pair                                           │
//! │  2. s ← ECDH(e.private, recipient.public)                              │
//! │  3. W ← HKDF-SHA256(s, salt="ECDH-AES-KEY-SALT",                       │
//! │                        info="ECDH-AES-256-GCM-Key")                    │
//! │  4. iv ← 12 random bytes                                               │
//! │  5. c ← AES-256-GCM(W, iv, message)                                    │
//! │                                                                         │
//! │  Envelope = { c, iv, e.public, algorithm tags }                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The recipient recomputes `s` from their own private key and `e.public`.
//! A fresh `e` and `iv` per call means two envelopes for the same message
//! and recipient share nothing observable.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "encryptedMessage": "base64...",   // ciphertext || 16-byte tag
//!   "iv": "base64...",                 // 12 bytes
//!   "algorithm": "HYBRID-ECDH-AES-GCM",
//!   "keyType": "ECDH",
//!   "version": "1.0",
//!   "ephemeralPublicKey": { "crv": "P-256", "ext": true, "kty": "EC", "x": "...", "y": "..." },
//!   "publicKeyHash": "0123456789abcdef" // optional, recipient fingerprint
//! }
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{self, derive_wrapping_key, KeyPair, Nonce};
use crate::error::{Error, Result};
use crate::identity::PublicKeyRecord;

/// `algorithm` tag of every envelope this crate produces or accepts
pub const ALGORITHM: &str = "HYBRID-ECDH-AES-GCM";

/// `keyType` tag
pub const KEY_TYPE: &str = "ECDH";

/// Envelope format version
pub const VERSION: &str = "1.0";

/// A per-recipient wrapped secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// AES-GCM ciphertext with tag (base64)
    pub encrypted_message: String,
    /// AES-GCM nonce (base64, 12 bytes)
    pub iv: String,
    /// Scheme tag, must be [`ALGORITHM`] to decrypt
    pub algorithm: String,
    /// Key agreement tag
    pub key_type: String,
    /// Format version
    pub version: String,
    /// Public half of the one-off key pair used for this envelope
    pub ephemeral_public_key: PublicKeyRecord,
    /// Fingerprint of the recipient key the envelope was made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hash: Option<String>,
}

impl EncryptedEnvelope {
    /// Serialize to JSON
    ///
    /// This is the string stored in a message's `encryptedKey` field.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Deserialize from JSON
    ///
    /// The `algorithm` tag is checked before the shape, so a package from
    /// another scheme (the x25519 variant tags itself only by `version`)
    /// fails as `UnsupportedAlgorithm` rather than `MalformedInput`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::MalformedInput(format!("invalid envelope: {}", e)))?;
        if !value.is_object() {
            return Err(Error::MalformedInput("invalid envelope: not a JSON object".into()));
        }

        match value.get("algorithm").and_then(Value::as_str) {
            Some(ALGORITHM) => {}
            Some(other) => return Err(Error::UnsupportedAlgorithm(other.to_string())),
            None => {
                let scheme = value
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or("untagged");
                return Err(Error::UnsupportedAlgorithm(scheme.to_string()));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| Error::MalformedInput(format!("invalid envelope: {}", e)))
    }
}

/// Wrap `message` so only the holder of `recipient`'s private key can read it
///
/// ## Errors
///
/// - `InvalidKeyFormat` if the recipient key is not a usable P-256 point
/// - `LibraryUnavailable` if the crypto self-test failed
pub fn encrypt_for_recipient(message: &str, recipient: &PublicKeyRecord) -> Result<EncryptedEnvelope> {
    crypto::ensure_available()?;

    let recipient_key = recipient.to_public_key()?;

    let ephemeral = KeyPair::generate();
    let shared_secret = ephemeral.diffie_hellman(&recipient_key);
    let wrapping_key = derive_wrapping_key(&shared_secret[..])?;

    let (nonce, ciphertext) = crypto::encrypt(&wrapping_key, message.as_bytes())?;

    // The ephemeral point travels as a bare JWK, without the `alg` tag
    let ephemeral_public_key = PublicKeyRecord {
        alg: None,
        ..ephemeral.public_key_record()
    };

    tracing::debug!(recipient = %recipient.fingerprint(), "Wrapped envelope");

    Ok(EncryptedEnvelope {
        encrypted_message: BASE64.encode(&ciphertext),
        iv: BASE64.encode(nonce.as_bytes()),
        algorithm: ALGORITHM.to_string(),
        key_type: KEY_TYPE.to_string(),
        version: VERSION.to_string(),
        ephemeral_public_key,
        public_key_hash: Some(recipient.fingerprint()),
    })
}

/// Open an envelope with the key pair derived from `password`
///
/// Runs the full password derivation. Prefer
/// [`crate::Session::decrypt_envelope`] when opening more than one.
pub fn decrypt_envelope(envelope: &EncryptedEnvelope, password: &str) -> Result<String> {
    let keys = KeyPair::from_password(password)?;
    decrypt_envelope_with_keys(envelope, &keys)
}

/// Open an envelope with an already-derived key pair
///
/// ## Errors
///
/// - `UnsupportedAlgorithm` if the envelope is not [`ALGORITHM`]
/// - `InvalidKeyFormat` if the ephemeral key is not a usable P-256 point
/// - `MalformedInput` if `iv` or `encryptedMessage` is not base64
/// - `DecryptionFailed` on any authentication failure, including a wrong key
pub fn decrypt_envelope_with_keys(envelope: &EncryptedEnvelope, keys: &KeyPair) -> Result<String> {
    if envelope.algorithm != ALGORITHM {
        return Err(Error::UnsupportedAlgorithm(envelope.algorithm.clone()));
    }

    let ephemeral = envelope.ephemeral_public_key.to_public_key()?;

    let iv = BASE64.decode(envelope.iv.trim())?;
    let ciphertext = BASE64.decode(envelope.encrypted_message.trim())?;

    // A nonce of the wrong size cannot have come from a valid envelope
    let nonce = Nonce::from_slice(&iv).ok_or(Error::DecryptionFailed)?;

    let shared_secret = keys.diffie_hellman(&ephemeral);
    let wrapping_key = derive_wrapping_key(&shared_secret[..])?;

    let plaintext = crypto::decrypt(&wrapping_key, &nonce, &ciphertext)?;

    String::from_utf8(plaintext)
        .map_err(|_| Error::MalformedInput("envelope payload is not UTF-8".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static ALICE: Lazy<KeyPair> = Lazy::new(|| KeyPair::from_password("Abcdefgh123!").unwrap());
    static BOB: Lazy<KeyPair> = Lazy::new(|| KeyPair::from_password("Correct-Horse-42").unwrap());

    /// Envelope produced by the reference backend for "Abcdefgh123!"
    const REFERENCE_ENVELOPE: &str = r#"{"encryptedMessage": "WeQt2ZcLjinjo0Pv3j2tTiGTqYDV3q7EqdCIodo4bDiuaI/6tTPNsqFLCzLgqTDB", "iv": "jTF7hbSbA1D2lWjv", "algorithm": "HYBRID-ECDH-AES-GCM", "keyType": "ECDH", "version": "1.0", "ephemeralPublicKey": {"kty": "EC", "crv": "P-256", "x": "GcE9ZnKdGMKEtN-6q6PfvJhLU9vKMnxM165--E0PSZI", "y": "FlWLvdyBuko4-xQP7RVLb-jFixoVMKX_YigzFtJpoEg", "ext": true}, "publicKeyHash": "38a58f03dab23505"}"#;

    #[test]
    fn test_wrap_unwrap() {
        let envelope = encrypt_for_recipient("c2VjcmV0", &ALICE.public_key_record()).unwrap();

        assert_eq!(envelope.algorithm, ALGORITHM);
        assert_eq!(envelope.key_type, KEY_TYPE);
        assert_eq!(envelope.version, VERSION);
        assert_eq!(BASE64.decode(&envelope.iv).unwrap().len(), 12);

        let opened = decrypt_envelope_with_keys(&envelope, &ALICE).unwrap();
        assert_eq!(opened, "c2VjcmV0");
    }

    #[test]
    fn test_decrypt_with_password() {
        let envelope = encrypt_for_recipient("c2VjcmV0", &BOB.public_key_record()).unwrap();

        assert_eq!(decrypt_envelope(&envelope, "Correct-Horse-42").unwrap(), "c2VjcmV0");
    }

    #[test]
    fn test_envelopes_are_unlinkable() {
        let record = ALICE.public_key_record();

        let e1 = encrypt_for_recipient("same", &record).unwrap();
        let e2 = encrypt_for_recipient("same", &record).unwrap();

        assert_ne!(e1.iv, e2.iv);
        assert_ne!(e1.ephemeral_public_key, e2.ephemeral_public_key);
        assert_ne!(e1.encrypted_message, e2.encrypted_message);
    }

    #[test]
    fn test_wrong_key_pair_rejected() {
        let envelope = encrypt_for_recipient("c2VjcmV0", &ALICE.public_key_record()).unwrap();

        let result = decrypt_envelope_with_keys(&envelope, &BOB);
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_reference_envelope_decrypts() {
        let envelope = EncryptedEnvelope::from_json(REFERENCE_ENVELOPE).unwrap();

        let opened = decrypt_envelope_with_keys(&envelope, &ALICE).unwrap();
        assert_eq!(opened, "c3ltbWV0cmljLWtleS1mb3ItdGVzdHM=");
    }

    #[test]
    fn test_unsupported_algorithm() {
        let mut envelope = encrypt_for_recipient("x", &ALICE.public_key_record()).unwrap();
        envelope.algorithm = "x25519-xsalsa20-poly1305".into();

        let result = decrypt_envelope_with_keys(&envelope, &ALICE);
        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_wrong_curve_recipient_rejected() {
        let mut record = ALICE.public_key_record();
        record.crv = Some("P-521".into());

        let result = encrypt_for_recipient("x", &record);
        assert!(matches!(result, Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let mut envelope = encrypt_for_recipient("c2VjcmV0", &ALICE.public_key_record()).unwrap();
        let mut bytes = BASE64.decode(&envelope.encrypted_message).unwrap();
        bytes[0] ^= 0x01;
        envelope.encrypted_message = BASE64.encode(bytes);

        let result = decrypt_envelope_with_keys(&envelope, &ALICE);
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_short_iv_rejected() {
        let mut envelope = encrypt_for_recipient("c2VjcmV0", &ALICE.public_key_record()).unwrap();
        envelope.iv = BASE64.encode([0u8; 8]);

        let result = decrypt_envelope_with_keys(&envelope, &ALICE);
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_json_field_names() {
        let envelope = encrypt_for_recipient("x", &ALICE.public_key_record()).unwrap();
        let json = envelope.to_json().unwrap();

        assert!(json.starts_with(r#"{"encryptedMessage":"#));
        assert!(json.contains(r#""keyType":"ECDH""#));
        assert!(json.contains(r#""ephemeralPublicKey":{"crv":"P-256""#));
        assert!(json.contains(&format!(
            r#""publicKeyHash":"{}""#,
            ALICE.public_key_record().fingerprint()
        )));

        assert_eq!(EncryptedEnvelope::from_json(&json).unwrap(), envelope);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        for text in ["not json", "[1, 2]", r#"{"algorithm": "HYBRID-ECDH-AES-GCM", "iv": 3}"#] {
            let result = EncryptedEnvelope::from_json(text);
            assert!(matches!(result, Err(Error::MalformedInput(_))), "{}", text);
        }
    }

    #[test]
    fn test_from_json_foreign_scheme() {
        let metamask = r#"{"version": "x25519-xsalsa20-poly1305", "nonce": "1dvWO7uOnBnO7iNDJ9kO9pTasLuKNlej", "ephemPublicKey": "FBH1/pAEHOOW14Lu3FWkgV3qOEcuL78Zy+qW1RwzMXQ=", "ciphertext": "f8kBcl/NCyf3sybfbwAKk/np2Bzt9lRVkZejr6uh5FgnNlH/ic62DZzy"}"#;
        match EncryptedEnvelope::from_json(metamask) {
            Err(Error::UnsupportedAlgorithm(scheme)) => assert_eq!(scheme, "x25519-xsalsa20-poly1305"),
            other => panic!("unexpected {:?}", other),
        }

        let rsa = r#"{"algorithm": "RSA-OAEP", "encryptedMessage": "AAAA"}"#;
        match EncryptedEnvelope::from_json(rsa) {
            Err(Error::UnsupportedAlgorithm(scheme)) => assert_eq!(scheme, "RSA-OAEP"),
            other => panic!("unexpected {:?}", other),
        }

        let untagged = r#"{"encryptedMessage": "AAAA", "iv": "AAAA"}"#;
        assert!(matches!(
            EncryptedEnvelope::from_json(untagged),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
