//! # Ekozir Core
//!
//! The hybrid public-key messaging codec behind Ekozir group messaging.
//! Passwords derive P-256 key pairs, so there is no key storage; each
//! message is encrypted once and its key wrapped per recipient.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         EKOZIR CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │   Crypto    │  │  Identity   │  │  Messaging  │  │   Session    │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - PBKDF2    │  │ - Key record│  │ - Content   │  │ - Cached     │   │
//! │  │ - HKDF      │  │ - Normalize │  │ - Envelopes │  │   key pair   │   │
//! │  │ - P-256     │  │ - Pasted key│  │ - Send plan │  │ - Open/send  │   │
//! │  │ - AES-GCM   │  │ - Password  │  │ - Records   │  │              │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴────────────────┴────────────────┘           │
//! │                                                                         │
//! │  Persistence, transport and UI live outside this crate. It only        │
//! │  defines the records that cross to them.                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key derivation, P-256 key pairs, AES-256-GCM
//! - [`identity`] - Canonical public key records and password policy
//! - [`messaging`] - Envelopes, content blobs, multi-recipient send plans
//! - [`session`] - A logged-in user's cached key pair
//!
//! ## Quick Start
//!
//! ```ignore
//! use ekozir_core::Session;
//!
//! let alice = Session::unlock("Abcdefgh123!")?;
//! let plan = alice.build_send_plan("hello", &[bob_key_json])?;
//! for message in plan.outgoing_messages()? {
//!     transport.send(message)?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod crypto;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod session;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use crypto::{EncryptionKey, KeyPair};
pub use error::{Error, Result};
pub use identity::{parse_and_validate, validate_password, PasswordRequirements, PublicKeyRecord};
pub use messaging::{
    build_send_plan, EncryptedEnvelope, MessageId, MessageRecord, OutgoingMessage, SendPlan,
};
pub use session::Session;

// ============================================================================
// CORE INSTANCE
// ============================================================================

use once_cell::sync::OnceCell;

/// Global Ekozir Core instance
static CORE_INSTANCE: OnceCell<EkozirCore> = OnceCell::new();

/// Configuration for initializing Ekozir Core
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Enable verbose logging
    pub verbose_logging: bool,
}

/// Process-wide handle proving the crypto backends passed their self-test
///
/// Initializing is optional; every operation checks lazily. Doing it once
/// at startup surfaces `LibraryUnavailable` there instead of on the first
/// message.
#[derive(Debug)]
pub struct EkozirCore {
    config: CoreConfig,
}

impl EkozirCore {
    /// Run the capability check and register the global instance
    ///
    /// ## Example
    ///
    /// ```ignore
    /// use ekozir_core::{CoreConfig, EkozirCore};
    ///
    /// EkozirCore::initialize(CoreConfig::default())?;
    /// ```
    pub fn initialize(config: CoreConfig) -> Result<&'static EkozirCore> {
        tracing::info!("Initializing Ekozir Core v{}", env!("CARGO_PKG_VERSION"));

        crypto::ensure_available()?;

        if config.verbose_logging {
            tracing::debug!("Build info: {:?}", build_info());
        }

        CORE_INSTANCE
            .set(Self { config })
            .map_err(|_| Error::AlreadyInitialized)?;

        tracing::info!("Ekozir Core initialized successfully");
        Self::instance()
    }

    /// Get the global core instance
    ///
    /// Returns an error if the core hasn't been initialized.
    pub fn instance() -> Result<&'static EkozirCore> {
        CORE_INSTANCE.get().ok_or(Error::NotInitialized)
    }

    /// Check if the core is initialized
    pub fn is_initialized() -> bool {
        CORE_INSTANCE.get().is_some()
    }

    /// The configuration the core was initialized with
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Ekozir Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        #[cfg(target_os = "macos")]
        target: "macos",
        #[cfg(target_os = "linux")]
        target: "linux",
        #[cfg(target_os = "windows")]
        target: "windows",
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        target: "unknown",
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target OS
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================
