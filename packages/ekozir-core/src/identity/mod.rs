//! # Identity Module
//!
//! A user's identity is their password-derived public key, published as a
//! [`PublicKeyRecord`]. The record is compared as text when logging in,
//! used as a lookup key for group members, and used as the sender tag on
//! messages, so its serialized form has to be stable.
//!
//! ## Canonical Form
//!
//! ```text
//! {"alg":"ECDH-P256","crv":"P-256","ext":true,"kty":"EC","x":"…","y":"…"}
//!   │                 │            │          │         │       │
//!   └── exactly these six fields, in this order, compact JSON ──┘
//! ```
//!
//! [`normalize`] maps any key-shaped JSON onto that form: extra fields are
//! dropped, missing ones are omitted, and the order is fixed by the struct.
//! Two records for the same point therefore serialize byte-identically.
//!
//! ## Pasted Keys
//!
//! [`parse_and_validate`] accepts text a user pasted (whitespace, line
//! breaks and all) and returns the canonical string, or `None`. Failing is
//! the expected outcome for bad input, not an error.

mod password;

pub use password::{validate_password, PasswordRequirements, MIN_PASSWORD_LENGTH, SPECIAL_CHARACTERS};

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::PublicKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::crypto::{public_key_from_coordinates, COORDINATE_SIZE};
use crate::error::{Error, Result};

/// `alg` value of every derived key
pub const KEY_ALGORITHM: &str = "ECDH-P256";

/// `crv` value of every supported key
pub const CURVE: &str = "P-256";

/// `kty` value of every supported key
pub const KEY_TYPE: &str = "EC";

/// Length of a key fingerprint in hex characters
pub const FINGERPRINT_LENGTH: usize = 16;

/// A public key in canonical JWK-like form
///
/// Field declaration order is the serialization order. Absent fields are
/// skipped rather than written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Key algorithm, `"ECDH-P256"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Curve name, `"P-256"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Extractable flag, always `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,

    /// Key type, `"EC"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    /// Affine x, base64url without padding (32 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Affine y, base64url without padding (32 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl PublicKeyRecord {
    /// Build a complete record from raw affine coordinates
    pub fn from_coordinates(x: &[u8; COORDINATE_SIZE], y: &[u8; COORDINATE_SIZE]) -> Self {
        Self {
            alg: Some(KEY_ALGORITHM.to_string()),
            crv: Some(CURVE.to_string()),
            ext: Some(true),
            kty: Some(KEY_TYPE.to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
        }
    }

    /// Serialize to the canonical compact JSON string
    pub fn to_canonical_json(&self) -> String {
        self.to_string()
    }

    /// Short identifier: the first 16 hex chars of SHA-256 over the canonical JSON
    ///
    /// Safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.to_canonical_json().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LENGTH);
        hex
    }

    /// Import the record as a P-256 point
    ///
    /// ## Errors
    ///
    /// `InvalidKeyFormat` if `crv` is not `"P-256"`, a coordinate is missing
    /// or not 32 bytes of base64url, or the point is not on the curve.
    pub fn to_public_key(&self) -> Result<PublicKey> {
        if self.crv.as_deref() != Some(CURVE) {
            return Err(Error::InvalidKeyFormat(format!(
                "expected curve {}, got {}",
                CURVE,
                self.crv.as_deref().unwrap_or("none")
            )));
        }

        let x = decode_coordinate("x", self.x.as_deref())?;
        let y = decode_coordinate("y", self.y.as_deref())?;
        public_key_from_coordinates(&x, &y)
    }
}

impl fmt::Display for PublicKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

fn decode_coordinate(name: &str, value: Option<&str>) -> Result<[u8; COORDINATE_SIZE]> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidKeyFormat(format!("missing {} coordinate", name)))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| Error::InvalidKeyFormat(format!("{} is not base64url: {}", name, e)))?;

    bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidKeyFormat(format!(
            "{} must be {} bytes, got {}",
            name,
            COORDINATE_SIZE,
            bytes.len()
        ))
    })
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Result of normalizing key text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The text parsed as JSON and was mapped onto the canonical fields
    Record(PublicKeyRecord),
    /// The text was not JSON; it is handed back untouched
    ///
    /// Callers must read this as "not a key", never as success.
    Unparsed(String),
}

/// Map a parsed key object onto the six canonical fields
///
/// Extra fields are dropped. A field that is missing, or holds the wrong
/// JSON type, comes out as `None`. Non-objects yield an empty record.
pub fn normalize(value: &Value) -> PublicKeyRecord {
    let text = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_owned);

    PublicKeyRecord {
        alg: text("alg"),
        crv: text("crv"),
        ext: value.get("ext").and_then(Value::as_bool),
        kty: text("kty"),
        x: text("x"),
        y: text("y"),
    }
}

/// Normalize key text, parsing it first
pub fn normalize_json(text: &str) -> Normalized {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Normalized::Record(normalize(&value)),
        Err(_) => Normalized::Unparsed(text.to_string()),
    }
}

/// Compare two stored key strings by their canonical form
///
/// Text that does not parse only matches byte-identical text.
pub fn same_key(a: &str, b: &str) -> bool {
    match (normalize_json(a), normalize_json(b)) {
        (Normalized::Record(a), Normalized::Record(b)) => a == b,
        (Normalized::Unparsed(a), Normalized::Unparsed(b)) => a == b,
        _ => false,
    }
}

/// Parse pasted key text into a canonical record
///
/// All whitespace is stripped before parsing. The object must carry
/// `kty == "EC"`, `crv == "P-256"` and non-empty string `x` and `y`.
///
/// ## Errors
///
/// `MalformedInput` naming the first check that failed.
pub fn parse_public_key(text: &str) -> Result<PublicKeyRecord> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::MalformedInput("empty input".into()));
    }

    let value: Value = serde_json::from_str(&compact)
        .map_err(|e| Error::MalformedInput(format!("not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(Error::MalformedInput("expected a JSON object".into()));
    }

    let field = |name: &str| value.get(name).and_then(Value::as_str);

    if field("kty") != Some(KEY_TYPE) {
        return Err(Error::MalformedInput(format!("kty must be \"{}\"", KEY_TYPE)));
    }
    if field("crv") != Some(CURVE) {
        return Err(Error::MalformedInput(format!("crv must be \"{}\"", CURVE)));
    }
    for name in ["x", "y"] {
        if field(name).map_or(true, str::is_empty) {
            return Err(Error::MalformedInput(format!("missing {} coordinate", name)));
        }
    }

    Ok(normalize(&value))
}

/// Validate pasted key text and return its canonical JSON, or `None`
pub fn parse_and_validate(text: &str) -> Option<String> {
    match parse_public_key(text) {
        Ok(record) => Some(record.to_canonical_json()),
        Err(e) => {
            tracing::debug!("Rejected pasted public key: {}", e);
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;

    const X: &str = "kRqpzXCKmqPFCEBxp0n5BICLSRvyJfmz1Vi38NgtWW0";
    const Y: &str = "IjwYoQO0gqm59_G6lS_RHciZ2nlMvGwwPuQ1x5M4644";

    fn backend_style_key() -> Value {
        // Field order as the Python backend emits it
        json!({"kty": "EC", "crv": "P-256", "x": X, "y": Y, "alg": "ECDH-P256", "ext": true})
    }

    #[test]
    fn test_canonical_field_order() {
        let record = normalize(&backend_style_key());

        assert_eq!(
            record.to_canonical_json(),
            format!(
                r#"{{"alg":"ECDH-P256","crv":"P-256","ext":true,"kty":"EC","x":"{}","y":"{}"}}"#,
                X, Y
            )
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize(&backend_style_key());
        let twice = normalize(&serde_json::to_value(&once).unwrap());

        assert_eq!(once, twice);
        assert_eq!(once.to_canonical_json(), twice.to_canonical_json());
    }

    #[test]
    fn test_normalize_drops_extra_and_omits_missing() {
        let record = normalize(&json!({"kty": "EC", "x": X, "use": "enc", "kid": "1"}));

        assert_eq!(record.to_canonical_json(), format!(r#"{{"kty":"EC","x":"{}"}}"#, X));
    }

    #[test]
    fn test_normalize_json_unparsed_returns_input() {
        assert_eq!(
            normalize_json("not json"),
            Normalized::Unparsed("not json".to_string())
        );
    }

    #[test]
    fn test_same_key_ignores_order_and_spacing() {
        let a = backend_style_key().to_string();
        let b = normalize(&backend_style_key()).to_canonical_json();

        assert!(same_key(&a, &b));
        assert!(!same_key(&a, "not json"));
    }

    #[test]
    fn test_derived_record_imports() {
        let keys = KeyPair::generate();
        let record = keys.public_key_record();

        assert_eq!(&record.to_public_key().unwrap(), keys.public_key());
    }

    #[test]
    fn test_to_public_key_wrong_curve() {
        let mut record = normalize(&backend_style_key());
        record.crv = Some("P-384".into());

        assert!(matches!(record.to_public_key(), Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_to_public_key_short_coordinate() {
        let mut record = normalize(&backend_style_key());
        record.x = Some("AAAA".into());

        assert!(matches!(record.to_public_key(), Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_fingerprint_stable() {
        let record = normalize(&backend_style_key());

        assert_eq!(record.fingerprint().len(), FINGERPRINT_LENGTH);
        assert_eq!(record.fingerprint(), normalize(&backend_style_key()).fingerprint());
    }

    #[test]
    fn test_parse_and_validate_pasted_with_whitespace() {
        let pasted = format!(
            "{{\n  \"kty\": \"EC\",\n  \"crv\": \"P-256\",\r\n  \"x\": \"{}\",\n  \"y\": \"{}\"\n}}\n",
            X, Y
        );

        let canonical = parse_and_validate(&pasted).unwrap();
        assert_eq!(
            canonical,
            format!(r#"{{"crv":"P-256","kty":"EC","x":"{}","y":"{}"}}"#, X, Y)
        );
    }

    #[test]
    fn test_parse_and_validate_not_json() {
        assert_eq!(parse_and_validate("not json"), None);
        assert_eq!(parse_and_validate(""), None);
        assert_eq!(parse_and_validate("   \n"), None);
    }

    #[test]
    fn test_parse_rejects_wrong_curve_and_missing_fields() {
        let wrong_curve = json!({"kty": "EC", "crv": "secp256k1", "x": X, "y": Y}).to_string();
        let missing_y = json!({"kty": "EC", "crv": "P-256", "x": X}).to_string();
        let empty_x = json!({"kty": "EC", "crv": "P-256", "x": "", "y": Y}).to_string();
        let okp = json!({"kty": "OKP", "crv": "P-256", "x": X, "y": Y}).to_string();

        for text in [wrong_curve, missing_y, empty_x, okp] {
            assert!(matches!(parse_public_key(&text), Err(Error::MalformedInput(_))));
            assert_eq!(parse_and_validate(&text), None);
        }
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(parse_public_key("[1,2,3]"), Err(Error::MalformedInput(_))));
        assert!(matches!(parse_public_key("\"EC\""), Err(Error::MalformedInput(_))));
    }
}
