//! # Session
//!
//! A logged-in user: their password-derived key pair, derived once, plus
//! the canonical form of its public half.
//!
//! ```text
//! password ──unlock()──► Session { keys, public_key }
//!                             │
//!                             ├── decrypt_envelope / open_message
//!                             ├── build_send_plan      (sender = self)
//!                             ├── matches_registered_key
//!                             └── is_own_message
//! ```
//!
//! Deriving costs a 100,000-round PBKDF2. In async contexts use
//! [`Session::unlock_async`], which runs it on the blocking pool.

use zeroize::Zeroizing;

use crate::crypto::KeyPair;
use crate::error::{Error, Result};
use crate::identity::{same_key, PublicKeyRecord};
use crate::messaging::{self, EncryptedEnvelope, MessageRecord, SendPlan};

/// An unlocked user session
#[derive(Debug, Clone)]
pub struct Session {
    username: Option<String>,
    keys: KeyPair,
    public_key: PublicKeyRecord,
}

impl Session {
    /// Derive the key pair for `password` and open a session
    pub fn unlock(password: &str) -> Result<Self> {
        let keys = KeyPair::from_password(password)?;
        let public_key = keys.public_key_record();

        tracing::info!(key = %public_key.fingerprint(), "Session unlocked");

        Ok(Self {
            username: None,
            keys,
            public_key,
        })
    }

    /// [`Session::unlock`] on tokio's blocking pool
    pub async fn unlock_async(password: impl Into<String>) -> Result<Self> {
        let password = Zeroizing::new(password.into());

        tokio::task::spawn_blocking(move || Self::unlock(&password))
            .await
            .map_err(|e| Error::Internal(format!("key derivation task failed: {}", e)))?
    }

    /// Attach the username the key is registered under
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Registered username, if known
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The derived key pair
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Own public key record
    pub fn public_key(&self) -> &PublicKeyRecord {
        &self.public_key
    }

    /// Own public key as canonical JSON, the form registered with the server
    pub fn public_key_json(&self) -> String {
        self.public_key.to_canonical_json()
    }

    /// Whether `registered` (as stored server-side) is this session's key
    ///
    /// Field order and whitespace do not matter. A password that derives a
    /// different key fails this check; that is how a login is rejected.
    pub fn matches_registered_key(&self, registered: &str) -> bool {
        same_key(registered, &self.public_key_json())
    }

    /// Whether this session sent `record`
    pub fn is_own_message(&self, record: &MessageRecord) -> bool {
        record
            .sender
            .as_deref()
            .map_or(false, |sender| self.matches_registered_key(sender))
    }

    /// Open an envelope wrapped for this session's key
    pub fn decrypt_envelope(&self, envelope: &EncryptedEnvelope) -> Result<String> {
        messaging::decrypt_envelope_with_keys(envelope, &self.keys)
    }

    /// Decrypt a stored message
    pub fn open_message(&self, record: &MessageRecord) -> Result<String> {
        messaging::open_message(record, &self.keys)
    }

    /// Decrypt a stored message, `None` if it cannot be read
    pub fn try_open_message(&self, record: &MessageRecord) -> Option<String> {
        messaging::try_open_message(record, &self.keys)
    }

    /// Build a send plan with this session as the sender
    pub fn build_send_plan<S: AsRef<str>>(&self, plaintext: &str, recipients: &[S]) -> Result<SendPlan> {
        messaging::build_send_plan(plaintext, recipients, &self.public_key)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static ALICE: Lazy<Session> = Lazy::new(|| Session::unlock("Abcdefgh123!").unwrap());
    static BOB: Lazy<Session> = Lazy::new(|| Session::unlock("Correct-Horse-42").unwrap());

    const ALICE_KEY: &str = r#"{"alg":"ECDH-P256","crv":"P-256","ext":true,"kty":"EC","x":"kRqpzXCKmqPFCEBxp0n5BICLSRvyJfmz1Vi38NgtWW0","y":"IjwYoQO0gqm59_G6lS_RHciZ2nlMvGwwPuQ1x5M4644"}"#;

    #[test]
    fn test_unlock_known_key() {
        assert_eq!(ALICE.public_key_json(), ALICE_KEY);
        assert!(ALICE.username().is_none());
    }

    #[tokio::test]
    async fn test_unlock_async_matches_sync() {
        let session = Session::unlock_async("Abcdefgh123!").await.unwrap();

        assert_eq!(session.public_key(), ALICE.public_key());
    }

    #[test]
    fn test_with_username() {
        let session = ALICE.clone().with_username("alice");
        assert_eq!(session.username(), Some("alice"));
    }

    #[test]
    fn test_matches_registered_key() {
        // Stored by the backend with its own field order and spacing
        let stored = r#"{"kty": "EC", "crv": "P-256", "x": "kRqpzXCKmqPFCEBxp0n5BICLSRvyJfmz1Vi38NgtWW0", "y": "IjwYoQO0gqm59_G6lS_RHciZ2nlMvGwwPuQ1x5M4644", "alg": "ECDH-P256", "ext": true}"#;

        assert!(ALICE.matches_registered_key(stored));
        assert!(!BOB.matches_registered_key(stored));
        assert!(!ALICE.matches_registered_key("not json"));
    }

    #[test]
    fn test_send_and_read_back() {
        let plan = ALICE.build_send_plan("hi bob", &[BOB.public_key_json()]).unwrap();
        let outgoing = plan.outgoing_messages().unwrap();

        let to_bob = MessageRecord {
            id: Some("42".into()),
            sender: Some(ALICE.public_key_json()),
            encrypted_key: Some(outgoing[0].encrypted_key.clone()),
            encrypted_content: Some(outgoing[0].encrypted_content.clone()),
        };
        let sent_copy = MessageRecord {
            encrypted_key: Some(outgoing[0].encrypted_key_for_sender.clone()),
            ..to_bob.clone()
        };

        assert_eq!(BOB.open_message(&to_bob).unwrap(), "hi bob");
        assert_eq!(ALICE.open_message(&sent_copy).unwrap(), "hi bob");
        assert!(ALICE.try_open_message(&to_bob).is_none());

        assert!(ALICE.is_own_message(&to_bob));
        assert!(!BOB.is_own_message(&to_bob));
    }

    #[test]
    fn test_decrypt_envelope_wrong_session() {
        let envelope = messaging::encrypt_for_recipient("c2VjcmV0", BOB.public_key()).unwrap();

        assert_eq!(BOB.decrypt_envelope(&envelope).unwrap(), "c2VjcmV0");
        assert!(matches!(ALICE.decrypt_envelope(&envelope), Err(Error::DecryptionFailed)));
    }
}
