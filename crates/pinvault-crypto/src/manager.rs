//! Password-based encryption facade.
//!
//! [`CryptoManager`] sequences the engine's primitives into the two
//! operations callers actually use: turn a password/PIN and a payload into a
//! self-contained envelope string, and turn that envelope back into the
//! payload when the same password is presented.
//!
//! Passwords and PINs are never persisted; the manager only ever stores the
//! custody-wrapped operating key (see [`crate::keyset`]). Every encryption
//! uses a fresh salt and a fresh nonce, so encrypting the same payload twice
//! under the same password yields different envelopes.
//!
//! Both operations run PBKDF2 at full cost and block for tens to hundreds of
//! milliseconds by design. Call them off any latency-sensitive thread.

use std::path::{Path, PathBuf};

use crate::error::{CryptoError, Result};
use crate::keychain::{self, KeyCustody};
use crate::keyset::Keyset;
use crate::{crypto, envelope};

/// Minimum password/PIN length, in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Password-based encryption engine.
///
/// # Example
///
/// ```rust,no_run
/// use pinvault_crypto::CryptoManager;
///
/// # fn example() -> pinvault_crypto::Result<()> {
/// let manager = CryptoManager::open(std::path::Path::new("data"));
///
/// let sealed = manager.encrypt_data("1234", b"secret-note")?;
/// let opened = manager.decrypt_data("1234", &sealed)?;
/// assert_eq!(opened, b"secret-note");
/// # Ok(())
/// # }
/// ```
pub struct CryptoManager {
    keyset: Keyset,
}

impl CryptoManager {
    /// Create a manager with an explicit keyset path and custody backend.
    pub fn new(keyset_path: impl Into<PathBuf>, custody: Box<dyn KeyCustody>) -> Self {
        Self {
            keyset: Keyset::new(keyset_path, custody),
        }
    }

    /// Create a manager with the platform's best custody backend, keeping
    /// the keyset file under `data_dir`.
    pub fn open(data_dir: &Path) -> Self {
        Self::new(Keyset::default_path(data_dir), keychain::platform_custody())
    }

    /// Encrypt `plaintext` under `password_or_pin` into an envelope string.
    ///
    /// A fresh salt is generated per call; encrypting identical inputs twice
    /// produces different envelopes, both of which decrypt correctly.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PasswordTooShort`] before any cryptographic
    /// work if the password fails the length policy, and propagates custody
    /// and provider failures.
    pub fn encrypt_data(&self, password_or_pin: &str, plaintext: &[u8]) -> Result<String> {
        check_password(password_or_pin)?;

        let salt = crypto::generate_salt()?;
        let derived = crypto::derive_key(password_or_pin.as_bytes(), &salt);
        let operating = self.keyset.operating_key()?;
        let key = crypto::session_key(&*derived, &operating)?;

        let (nonce, ciphertext) = crypto::encrypt(plaintext, &*key)?;

        tracing::debug!(plaintext_len = plaintext.len(), "sealed payload into envelope");
        Ok(envelope::seal(&salt, &nonce, &ciphertext))
    }

    /// Decrypt an envelope string produced by
    /// [`encrypt_data`](Self::encrypt_data).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PasswordTooShort`] on a policy violation,
    /// [`CryptoError::MalformedEnvelope`] /
    /// [`CryptoError::UnsupportedVersion`] if the envelope cannot be parsed,
    /// and [`CryptoError::AuthenticationFailed`] if the password is wrong or
    /// the envelope has been tampered with (indistinguishable by design).
    pub fn decrypt_data(&self, password_or_pin: &str, encrypted: &str) -> Result<Vec<u8>> {
        check_password(password_or_pin)?;

        let parsed = envelope::open(encrypted)?;
        let derived = crypto::derive_key(password_or_pin.as_bytes(), &parsed.salt);
        let operating = self.keyset.operating_key()?;
        let key = crypto::session_key(&*derived, &operating)?;

        let plaintext = crypto::decrypt(&parsed.nonce, &parsed.ciphertext, &*key)?;

        tracing::debug!(plaintext_len = plaintext.len(), "opened envelope");
        Ok(plaintext)
    }
}

/// Enforce the minimum password/PIN length policy.
fn check_password(password_or_pin: &str) -> Result<()> {
    if password_or_pin.chars().count() < MIN_PASSWORD_LEN {
        return Err(CryptoError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
