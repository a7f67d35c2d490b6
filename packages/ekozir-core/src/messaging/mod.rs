//! # Messaging Module
//!
//! Group messages are encrypted once and readable by many.
//!
//! ## Send Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         MULTI-RECIPIENT SEND                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Input: "hello", [bob_key, carol_key], alice_key (sender)              │
//! │                                                                         │
//! │  1. Encrypt content once                                               │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  K ← random AES-256 key                                     │       │
//! │  │  blob = base64(iv || AES-GCM(K, iv, "hello"))               │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  2. Wrap base64(K) for every party                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  bob_key   ──► envelope_bob                                 │       │
//! │  │  carol_key ──► envelope_carol                               │       │
//! │  │  alice_key ──► envelope_sender   (always, for re-reading)   │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  A recipient whose key cannot be used is skipped and counted as a      │
//! │  failure. The others still get their envelope.                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receive Flow
//!
//! ```text
//! MessageRecord { encryptedKey, encryptedContent }
//!       │
//!       ├── encryptedKey ──► EncryptedEnvelope ──(own key pair)──► base64(K)
//!       │
//!       └── encryptedContent ──(K)──► plaintext
//! ```
//!
//! ## Transport Records
//!
//! ```text
//! {
//!   "recipientPublicKey": "{\"alg\":\"ECDH-P256\",...}",
//!   "encryptedContent": "base64(iv || ciphertext)",
//!   "encryptedKey": "{\"encryptedMessage\":...}",
//!   "encryptedKeyForSender": "{\"encryptedMessage\":...}",
//!   "messageHash": "0x<sha256 hex>"
//! }
//! ```

pub mod envelope;

pub use envelope::{
    decrypt_envelope, decrypt_envelope_with_keys, encrypt_for_recipient, EncryptedEnvelope,
    ALGORITHM, KEY_TYPE, VERSION,
};

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{self, EncryptionKey, KeyPair, Nonce, NONCE_SIZE};
use crate::error::{Error, Result};
use crate::identity::{normalize_json, Normalized, PublicKeyRecord};

// ============================================================================
// CONTENT
// ============================================================================

/// A message body encrypted under a one-time key
#[derive(Debug)]
pub struct EncryptedContent {
    /// The one-time content key; wrap it, never send it
    pub key: EncryptionKey,
    /// `base64(iv || ciphertext || tag)`, shared by all recipients
    pub blob: String,
}

impl EncryptedContent {
    /// The content key as standard base64, the text each envelope wraps
    pub fn symmetric_key_base64(&self) -> Zeroizing<String> {
        self.key.to_base64()
    }
}

/// Encrypt a message body under a fresh one-time key
pub fn encrypt_content(plaintext: &str) -> Result<EncryptedContent> {
    let key = EncryptionKey::generate();
    let (nonce, ciphertext) = crypto::encrypt(&key, plaintext.as_bytes())?;

    Ok(EncryptedContent {
        blob: pack_blob(&nonce, &ciphertext),
        key,
    })
}

/// Decrypt a content blob with the one-time key
///
/// ## Errors
///
/// - `MalformedInput` if the blob is not base64 or shorter than an IV
/// - `DecryptionFailed` if the key is wrong or the blob was altered
pub fn decrypt_content(blob: &str, key: &EncryptionKey) -> Result<String> {
    let bytes = BASE64.decode(blob.trim())?;
    if bytes.len() < NONCE_SIZE {
        return Err(Error::MalformedInput(format!(
            "content blob is {} bytes, shorter than the {}-byte IV",
            bytes.len(),
            NONCE_SIZE
        )));
    }

    let (iv, ciphertext) = bytes.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(iv).ok_or(Error::DecryptionFailed)?;
    let plaintext = crypto::decrypt(key, &nonce, ciphertext)?;

    String::from_utf8(plaintext).map_err(|_| Error::MalformedInput("message is not UTF-8".into()))
}

fn pack_blob(nonce: &Nonce, ciphertext: &[u8]) -> String {
    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(nonce.as_bytes());
    combined.extend_from_slice(ciphertext);
    BASE64.encode(combined)
}

/// `"0x"` followed by the hex SHA-256 of the plaintext
///
/// Lets the transport reference a message without seeing its content.
pub fn message_hash(plaintext: &str) -> String {
    format!("0x{}", hex::encode(Sha256::digest(plaintext.as_bytes())))
}

// ============================================================================
// SEND PLAN
// ============================================================================

/// An envelope addressed to one recipient
#[derive(Debug, Clone)]
pub struct RecipientEnvelope {
    /// Canonical key JSON of the recipient
    pub recipient: String,
    /// The content key wrapped for that recipient
    pub envelope: EncryptedEnvelope,
}

/// A recipient that could not be wrapped for
#[derive(Debug)]
pub struct RecipientFailure {
    /// Canonical key JSON, or the raw text if it did not parse
    pub recipient: String,
    /// Why wrapping failed
    pub error: Error,
}

/// Everything needed to deliver one message to a group
#[derive(Debug)]
pub struct SendPlan {
    /// Shared content blob
    pub encrypted_content: String,
    /// Hash of the plaintext, see [`message_hash`]
    pub message_hash: String,
    /// Canonical key JSON of the sender
    pub sender: String,
    /// The content key wrapped for the sender
    pub sender_envelope: EncryptedEnvelope,
    /// Successful recipients, in input order
    pub recipients: Vec<RecipientEnvelope>,
    /// Skipped recipients, in input order
    pub failures: Vec<RecipientFailure>,
}

impl SendPlan {
    /// Number of recipients that got an envelope (the sender not included)
    pub fn success_count(&self) -> usize {
        self.recipients.len()
    }

    /// Number of recipients that were skipped
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total envelopes in the plan, the sender's included
    pub fn envelope_count(&self) -> usize {
        self.recipients.len() + 1
    }

    /// Look up the envelope for a recipient by key text, in any field order
    pub fn envelope_for(&self, recipient: &str) -> Option<&EncryptedEnvelope> {
        let wanted = recipient_identity(recipient).0;
        self.recipients
            .iter()
            .find(|r| r.recipient == wanted)
            .map(|r| &r.envelope)
    }

    /// One transport record per successful recipient
    pub fn outgoing_messages(&self) -> Result<Vec<OutgoingMessage>> {
        let encrypted_key_for_sender = self.sender_envelope.to_json()?;

        self.recipients
            .iter()
            .map(|r| {
                Ok(OutgoingMessage {
                    recipient_public_key: r.recipient.clone(),
                    encrypted_content: self.encrypted_content.clone(),
                    encrypted_key: r.envelope.to_json()?,
                    encrypted_key_for_sender: encrypted_key_for_sender.clone(),
                    message_hash: self.message_hash.clone(),
                })
            })
            .collect()
    }
}

/// Resolve recipient key text to its identity string and, if it parsed, its record
fn recipient_identity(text: &str) -> (String, Option<PublicKeyRecord>) {
    match normalize_json(text) {
        Normalized::Record(record) => (record.to_canonical_json(), Some(record)),
        Normalized::Unparsed(raw) => (raw, None),
    }
}

/// Encrypt `plaintext` once and wrap its key for every recipient and the sender
///
/// Recipient keys are stored key strings (JSON). A recipient whose key does
/// not parse or does not import is recorded in [`SendPlan::failures`] and
/// the rest proceed.
///
/// ## Errors
///
/// Fails as a whole only if the content cannot be encrypted or the sender's
/// own key cannot be wrapped for; a plan the sender cannot re-read is never
/// returned.
pub fn build_send_plan<S: AsRef<str>>(
    plaintext: &str,
    recipients: &[S],
    sender: &PublicKeyRecord,
) -> Result<SendPlan> {
    let content = encrypt_content(plaintext)?;
    let symmetric_key = content.symmetric_key_base64();

    let sender_envelope = encrypt_for_recipient(&symmetric_key, sender)?;

    let mut plan = SendPlan {
        encrypted_content: content.blob.clone(),
        message_hash: message_hash(plaintext),
        sender: sender.to_canonical_json(),
        sender_envelope,
        recipients: Vec::with_capacity(recipients.len()),
        failures: Vec::new(),
    };

    for text in recipients {
        let (recipient, record) = recipient_identity(text.as_ref());

        let wrapped = match record {
            Some(record) => encrypt_for_recipient(&symmetric_key, &record),
            None => Err(Error::MalformedInput("recipient key is not JSON".into())),
        };

        match wrapped {
            Ok(envelope) => plan.recipients.push(RecipientEnvelope { recipient, envelope }),
            Err(error) => {
                tracing::warn!("Skipping recipient: {}", error);
                plan.failures.push(RecipientFailure { recipient, error });
            }
        }
    }

    tracing::debug!(
        sent = plan.success_count(),
        skipped = plan.failure_count(),
        "Built send plan"
    );

    Ok(plan)
}

// ============================================================================
// TRANSPORT RECORDS
// ============================================================================

/// One outgoing message, as handed to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Canonical key JSON of the recipient
    pub recipient_public_key: String,
    /// Shared content blob
    pub encrypted_content: String,
    /// Envelope JSON for the recipient
    pub encrypted_key: String,
    /// Envelope JSON for the sender
    pub encrypted_key_for_sender: String,
    /// `0x`-prefixed SHA-256 of the plaintext
    pub message_hash: String,
}

/// Transport-assigned message ID
///
/// The ledger hands out numeric IDs; older exports carry them as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{}", n),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        MessageId::Number(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::Text(id.to_string())
    }
}

/// A stored message as returned by the transport
///
/// Fields the codec does not need (`groupId`, `timestamp`, ...) are ignored.
///
/// Every field is optional; a record missing what decryption needs is
/// skipped, not an error for the caller's rendering flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Transport-assigned message ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Sender key JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Envelope JSON wrapped for the reader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    /// Shared content blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_content: Option<String>,
}

/// Decrypt a stored message with the reader's key pair
///
/// ## Errors
///
/// `MalformedInput` for a missing field, otherwise whatever opening the
/// envelope or the content fails with.
pub fn open_message(record: &MessageRecord, keys: &KeyPair) -> Result<String> {
    let encrypted_key = record
        .encrypted_key
        .as_deref()
        .ok_or_else(|| Error::MalformedInput("message has no encryptedKey".into()))?;
    let encrypted_content = record
        .encrypted_content
        .as_deref()
        .ok_or_else(|| Error::MalformedInput("message has no encryptedContent".into()))?;

    let envelope = EncryptedEnvelope::from_json(encrypted_key)?;
    let symmetric_key = Zeroizing::new(decrypt_envelope_with_keys(&envelope, keys)?);
    let key = EncryptionKey::from_base64(&symmetric_key)?;

    decrypt_content(encrypted_content, &key)
}

/// Like [`open_message`], but any failure is logged and yields `None`
///
/// Callers render `None` as a "could not decrypt" placeholder.
pub fn try_open_message(record: &MessageRecord, keys: &KeyPair) -> Option<String> {
    match open_message(record, keys) {
        Ok(plaintext) => Some(plaintext),
        Err(e) => {
            tracing::warn!(
                id = %record.id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string),
                "Could not open message: {}",
                e
            );
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
