//! Operating-key management.
//!
//! The engine never seals user data directly under the password-derived key.
//! Each [`Keyset`] owns a long-lived random operating key that is persisted
//! only in wrapped form, protected by a [`KeyCustody`] backend, and combined
//! with the password-derived key via HKDF for every operation (see
//! [`crate::crypto::session_key`]).
//!
//! The keyset file holds nothing but the wrapped blob the custody backend
//! produced; its contents are opaque to this module.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::crypto;
use crate::error::{CryptoError, Result};
use crate::keychain::KeyCustody;

/// A persisted, custody-wrapped operating key.
pub struct Keyset {
    /// Path to the wrapped operating key file.
    path: PathBuf,
    /// Custody backend that wraps and unwraps the key.
    custody: Box<dyn KeyCustody>,
}

impl Keyset {
    /// Create a keyset handle backed by `path` and `custody`.
    ///
    /// The file itself is created lazily on the first
    /// [`operating_key`](Self::operating_key) call.
    pub fn new(path: impl Into<PathBuf>, custody: Box<dyn KeyCustody>) -> Self {
        Self {
            path: path.into(),
            custody,
        }
    }

    /// Default keyset location: `<data_dir>/pinvault.keyset`.
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("pinvault.keyset")
    }

    /// Return the unwrapped operating key, generating and persisting a fresh
    /// one on first use.
    ///
    /// The key is returned in a [`Zeroizing`] buffer; callers must not cache
    /// it beyond one operation.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Io`] on keyset file failures and
    /// [`CryptoError::WrapFailed`] if the stored blob cannot be unwrapped
    /// (different machine, different master key, or corruption).
    pub fn operating_key(&self) -> Result<Zeroizing<Vec<u8>>> {
        if self.path.exists() {
            let wrapped = std::fs::read(&self.path)?;
            let key = Zeroizing::new(self.custody.unwrap(&wrapped)?);

            if key.len() != crypto::KEY_LEN {
                return Err(CryptoError::WrapFailed {
                    reason: format!(
                        "unwrapped operating key is {} bytes, expected {}",
                        key.len(),
                        crypto::KEY_LEN
                    ),
                });
            }

            tracing::trace!("unwrapped operating key from keyset file");
            return Ok(key);
        }

        self.initialize()
    }

    /// Generate a fresh operating key, wrap it, and write the keyset file.
    fn initialize(&self) -> Result<Zeroizing<Vec<u8>>> {
        let key = Zeroizing::new(crypto::random_bytes(crypto::KEY_LEN)?);
        let wrapped = self.custody.wrap(&key)?;

        // Ensure the parent directory exists.
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.path, &wrapped)?;

        // Restrict file permissions on Unix (owner read/write only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        tracing::info!(path = %self.path.display(), "created new operating keyset");
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
