//! Password-based encryption engine for PinVault.
//!
//! This crate turns a user-supplied password/PIN and an opaque payload into
//! a self-contained encrypted envelope, and back. Payloads are sealed with
//! AES-256-GCM under a key derived per operation from the password (PBKDF2)
//! and a long-lived operating key that only ever touches disk wrapped by a
//! platform custody backend.
//!
//! # Modules
//!
//! - [`crypto`] — AES-256-GCM encryption/decryption, PBKDF2 key derivation,
//!   HKDF session-key binding, salt generation.
//! - [`envelope`] — versioned `salt || nonce || ciphertext` framing, base64
//!   wire form.
//! - [`keychain`] — master-key custody backends (OS keychain, device-derived
//!   fallback).
//! - [`keyset`] — wrapped operating-key persistence.
//! - [`manager`] — the [`CryptoManager`] facade and password policy.
//! - [`error`] — unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pinvault_crypto::CryptoManager;
//!
//! # fn example() -> pinvault_crypto::Result<()> {
//! // Keyset file lives under `data/`; custody picks the best platform
//! // backend automatically.
//! let manager = CryptoManager::open(std::path::Path::new("data"));
//!
//! let envelope = manager.encrypt_data("1234", b"secret-note")?;
//! let plaintext = manager.decrypt_data("1234", &envelope)?;
//! assert_eq!(plaintext, b"secret-note");
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keychain;
pub mod keyset;
pub mod manager;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{CryptoError, Result};
pub use keychain::{DeviceCustody, KeyCustody, platform_custody};
pub use keyset::Keyset;
pub use manager::{CryptoManager, MIN_PASSWORD_LEN};
