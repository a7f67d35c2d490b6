//! # Error Handling
//!
//! This module provides the error type shared by every part of Ekozir Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Core Errors (100-199)                                             │
//! │  │   ├── NotInitialized        - Core not initialized                  │
//! │  │   ├── AlreadyInitialized    - Core already initialized              │
//! │  │   └── LibraryUnavailable    - Curve / AEAD backend unusable         │
//! │  │                                                                      │
//! │  ├── Key Errors (200-299)                                              │
//! │  │   ├── KeyDerivationFailed   - Password → key pair failed            │
//! │  │   ├── InvalidKeyFormat      - Malformed or wrong-curve public key   │
//! │  │   └── MalformedInput        - Pasted key text failed validation     │
//! │  │                                                                      │
//! │  ├── Crypto Errors (300-399)                                           │
//! │  │   ├── EncryptionFailed      - AES-GCM encryption failed             │
//! │  │   ├── DecryptionFailed      - Tag mismatch (wrong password / data)  │
//! │  │   └── UnsupportedAlgorithm  - Envelope uses an unknown scheme       │
//! │  │                                                                      │
//! │  └── Internal Errors (900-999)                                         │
//! │      ├── Internal              - Should not happen                     │
//! │      └── SerializationError    - JSON encode/decode failed             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decryption Failures
//!
//! `DecryptionFailed` carries no detail. A wrong password and
//! tampered data both surface as the same "could not decrypt" message so the
//! caller cannot be used as an oracle.

use thiserror::Error;

/// Result type alias for Ekozir Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Ekozir Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Core Lifecycle Errors (100-199)
    // ========================================================================

    /// Core has not been initialized
    #[error("Ekozir Core has not been initialized. Call EkozirCore::initialize() first.")]
    NotInitialized,

    /// Core has already been initialized
    #[error("Ekozir Core has already been initialized.")]
    AlreadyInitialized,

    /// The elliptic-curve or AEAD backend failed its self-test
    #[error("Cryptographic library unavailable: {0}")]
    LibraryUnavailable(String),

    // ========================================================================
    // Key Errors (200-299)
    // ========================================================================

    /// Key derivation failed
    #[error("Failed to derive keys: {0}")]
    KeyDerivationFailed(String),

    /// Public key is malformed or not on P-256
    #[error("Invalid public key format: {0}")]
    InvalidKeyFormat(String),

    /// User-supplied key text failed structural validation
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Authentication failed while decrypting
    #[error("Could not decrypt message")]
    DecryptionFailed,

    /// Envelope names a scheme this crate does not implement
    #[error("Unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Core lifecycle
    /// - 200-299: Keys
    /// - 300-399: Crypto
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Core (100-199)
            Error::NotInitialized => 100,
            Error::AlreadyInitialized => 101,
            Error::LibraryUnavailable(_) => 102,

            // Keys (200-299)
            Error::KeyDerivationFailed(_) => 200,
            Error::InvalidKeyFormat(_) => 201,
            Error::MalformedInput(_) => 202,

            // Crypto (300-399)
            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed => 301,
            Error::UnsupportedAlgorithm(_) => 302,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the core usable: the caller can show a
    /// placeholder, ask for a corrected key, or move on to the next message.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidKeyFormat(_)
                | Error::MalformedInput(_)
                | Error::UnsupportedAlgorithm(_)
                | Error::DecryptionFailed
        )
    }

    /// Check if this error requires user action
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Error::InvalidKeyFormat(_) | Error::MalformedInput(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::MalformedInput(format!("invalid base64: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotInitialized.code(), 100);
        assert_eq!(Error::LibraryUnavailable("x".into()).code(), 102);
        assert_eq!(Error::InvalidKeyFormat("x".into()).code(), 201);
        assert_eq!(Error::DecryptionFailed.code(), 301);
        assert_eq!(Error::UnsupportedAlgorithm("x".into()).code(), 302);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::DecryptionFailed.is_recoverable());
        assert!(Error::MalformedInput("not json".into()).is_recoverable());
        assert!(Error::UnsupportedAlgorithm("RSA".into()).is_recoverable());
        assert!(!Error::LibraryUnavailable("p256".into()).is_recoverable());
        assert!(!Error::KeyDerivationFailed("zero scalar".into()).is_recoverable());
    }

    #[test]
    fn test_decryption_failure_reveals_nothing() {
        assert_eq!(Error::DecryptionFailed.to_string(), "Could not decrypt message");
    }

    #[test]
    fn test_base64_error_is_malformed_input() {
        use base64::Engine;
        let err: Error = base64::engine::general_purpose::STANDARD
            .decode("***")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert!(err.requires_user_action());
    }
}
