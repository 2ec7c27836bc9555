//! Master-key custody for operating-key material.
//!
//! The operating key must never touch disk as plaintext. This module
//! provides a [`KeyCustody`] trait that abstracts over platform-specific
//! master-key holders:
//!
//! - **macOS**: Keychain Services via `security-framework`
//! - **Windows**: DPAPI (TODO)
//! - **Linux**: Secret Service / libsecret (TODO)
//! - **Fallback**: a device-derived software master key
//!
//! A custody backend is a stateless capability: `wrap` encrypts key material
//! for at-rest storage and `unwrap` reverses it. The raw master key never
//! leaves the backend.
//!
//! The [`DeviceCustody`] implementation is the cross-platform fallback. It
//! derives its master key from machine-specific data (hostname, username)
//! and an application salt. This is not as strong as a proper OS keychain,
//! but ensures the operating key is never stored in plaintext.
//!
//! # Security Notes
//!
//! - The device-derived fallback is a compromise. Anyone with access to the
//!   same machine and user account can reconstruct its master key. A real OS
//!   keychain provides hardware-backed or OS-protected custody.
//! - Wrapped blobs carry their own AEAD nonce; a fresh nonce is used for
//!   every wrap.

use zeroize::Zeroizing;

use crate::crypto;
use crate::error::{CryptoError, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over platform-specific master-key custody.
///
/// Implementations must be `Send + Sync` so one custody handle can serve
/// callers across threads.
pub trait KeyCustody: Send + Sync {
    /// Encrypt operating-key material for at-rest storage.
    fn wrap(&self, key_material: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt previously wrapped operating-key material.
    ///
    /// Returns [`CryptoError::WrapFailed`] if the blob was wrapped under a
    /// different master key or has been corrupted.
    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Device-derived fallback
// ---------------------------------------------------------------------------

/// Application salt mixed into the device-derived master key. Changing this
/// invalidates every previously wrapped keyset. Must be exactly
/// [`crypto::SALT_LEN`] (32) bytes.
const APP_SALT: &[u8; crypto::SALT_LEN] = b"pinvault-device-custody-v1\x00\x00\x00\x00\x00\x00";

/// Software custody backend whose master key is derived from
/// machine-specific data.
///
/// Wrapped blob layout (binary):
/// ```text
/// [12 bytes: AES-256-GCM nonce]
/// [remaining: AES-256-GCM ciphertext + 16-byte tag]
/// ```
#[derive(Debug, Default)]
pub struct DeviceCustody;

impl DeviceCustody {
    /// Create a new device-derived custody backend.
    pub fn new() -> Self {
        Self
    }

    /// Derive the master key from machine-specific data.
    ///
    /// This combines the hostname, username, and an application salt to
    /// produce a deterministic 256-bit key that is unique per machine/user
    /// combination.
    fn master_key(&self) -> Zeroizing<[u8; crypto::KEY_LEN]> {
        let hostname = Self::hostname();
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".into());

        // Combine machine identifiers with the application salt.
        let mut material = Zeroizing::new(Vec::with_capacity(
            hostname.len() + username.len() + APP_SALT.len(),
        ));
        material.extend_from_slice(hostname.as_bytes());
        material.extend_from_slice(username.as_bytes());
        material.extend_from_slice(APP_SALT);

        crypto::derive_key(&material, APP_SALT)
    }

    /// Get the system hostname.
    ///
    /// Falls back to "unknown-host" if the hostname cannot be determined.
    fn hostname() -> String {
        #[cfg(unix)]
        {
            std::fs::read_to_string("/etc/hostname")
                .map(|s| s.trim().to_string())
                .or_else(|_| std::env::var("HOSTNAME"))
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown-host".into())
        }

        #[cfg(not(unix))]
        {
            std::env::var("COMPUTERNAME")
                .or_else(|_| std::env::var("HOSTNAME"))
                .unwrap_or_else(|_| "unknown-host".into())
        }
    }
}

impl KeyCustody for DeviceCustody {
    fn wrap(&self, key_material: &[u8]) -> Result<Vec<u8>> {
        let master = self.master_key();
        let (nonce, ciphertext) = crypto::encrypt(key_material, &*master)?;

        let mut blob = Vec::with_capacity(crypto::NONCE_LEN_BYTES + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        tracing::debug!("wrapped operating key under device-derived master key");
        Ok(blob)
    }

    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        // Minimum size: nonce (12) + tag (16).
        if wrapped.len() < crypto::NONCE_LEN_BYTES + crypto::TAG_LEN {
            return Err(CryptoError::WrapFailed {
                reason: "wrapped key blob is too small / corrupted".into(),
            });
        }

        let master = self.master_key();

        let (nonce_bytes, ciphertext) = wrapped.split_at(crypto::NONCE_LEN_BYTES);
        let mut nonce = [0u8; crypto::NONCE_LEN_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        let key = crypto::decrypt(&nonce, ciphertext, &*master).map_err(|_| {
            CryptoError::WrapFailed {
                reason: "wrapped under a different master key or corrupted".into(),
            }
        })?;

        tracing::trace!("unwrapped operating key under device-derived master key");
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// macOS Keychain Services
// ---------------------------------------------------------------------------

/// The Security framework error code for "item not found"
/// (`errSecItemNotFound = -25300`).
#[cfg(target_os = "macos")]
const MACOS_ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// macOS custody backend whose master key lives in Keychain Services.
///
/// A random 256-bit master key is created in the user's login keychain on
/// first wrap, via the generic password APIs. This provides OS-protected
/// storage that is guarded by the user's login password and (on Apple
/// Silicon) the Secure Enclave. Wrapped blobs use the same nonce-prefixed
/// layout as [`DeviceCustody`].
#[cfg(target_os = "macos")]
pub struct MacOsCustody {
    /// The keychain service name (e.g. "com.pinvault.keyset").
    service_name: String,
    /// The keychain account name (e.g. "master-key").
    account_name: String,
}

#[cfg(target_os = "macos")]
impl MacOsCustody {
    /// Default service name used for keychain entries.
    const DEFAULT_SERVICE: &'static str = "com.pinvault.keyset";
    /// Default account name used for the master key entry.
    const DEFAULT_ACCOUNT: &'static str = "master-key";

    /// Create a new macOS custody backend with default service and account
    /// names.
    pub fn new() -> Self {
        Self {
            service_name: Self::DEFAULT_SERVICE.to_string(),
            account_name: Self::DEFAULT_ACCOUNT.to_string(),
        }
    }

    /// Create a new macOS custody backend with custom service and account
    /// names.
    ///
    /// This is useful for testing or running multiple vault instances that
    /// should not share the same keychain entry.
    pub fn with_names(service: &str, account: &str) -> Self {
        Self {
            service_name: service.to_string(),
            account_name: account.to_string(),
        }
    }

    /// Fetch the master key from the keychain, creating it on first use.
    fn master_key(&self, create_if_missing: bool) -> Result<Zeroizing<Vec<u8>>> {
        use security_framework::passwords::{get_generic_password, set_generic_password};

        match get_generic_password(&self.service_name, &self.account_name) {
            Ok(data) => {
                tracing::trace!(
                    service = %self.service_name,
                    "retrieved master key from macOS keychain"
                );
                Ok(Zeroizing::new(data.to_vec()))
            }
            Err(e) if e.code() == MACOS_ERR_SEC_ITEM_NOT_FOUND => {
                if !create_if_missing {
                    return Err(CryptoError::MasterKeyNotFound);
                }

                let key = Zeroizing::new(crypto::random_bytes(crypto::KEY_LEN)?);
                set_generic_password(&self.service_name, &self.account_name, &key).map_err(
                    |e| CryptoError::CustodyUnavailable {
                        reason: format!("macOS keychain write failed: {e}"),
                    },
                )?;

                tracing::info!(
                    service = %self.service_name,
                    "created master key in macOS keychain"
                );
                Ok(key)
            }
            Err(e) => Err(CryptoError::CustodyUnavailable {
                reason: format!("macOS keychain read failed: {e}"),
            }),
        }
    }
}

#[cfg(target_os = "macos")]
impl Default for MacOsCustody {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl KeyCustody for MacOsCustody {
    fn wrap(&self, key_material: &[u8]) -> Result<Vec<u8>> {
        let master = self.master_key(true)?;
        let (nonce, ciphertext) = crypto::encrypt(key_material, &master)?;

        let mut blob = Vec::with_capacity(crypto::NONCE_LEN_BYTES + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        tracing::debug!("wrapped operating key under macOS keychain master key");
        Ok(blob)
    }

    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        if wrapped.len() < crypto::NONCE_LEN_BYTES + crypto::TAG_LEN {
            return Err(CryptoError::WrapFailed {
                reason: "wrapped key blob is too small / corrupted".into(),
            });
        }

        let master = self.master_key(false)?;

        let (nonce_bytes, ciphertext) = wrapped.split_at(crypto::NONCE_LEN_BYTES);
        let mut nonce = [0u8; crypto::NONCE_LEN_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        crypto::decrypt(&nonce, ciphertext, &master).map_err(|_| CryptoError::WrapFailed {
            reason: "wrapped under a different master key or corrupted".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Platform-specific implementations (TODO)
// ---------------------------------------------------------------------------

// TODO: Windows DPAPI implementation
//
// Use the `windows` crate to call `CryptProtectData` / `CryptUnprotectData`
// directly as the wrap/unwrap pair. The blob is then tied to the current
// Windows user without any master-key bookkeeping on our side.
//
// pub struct WindowsDpapiCustody;

// TODO: Linux Secret Service implementation
//
// Use the `secret-service` or `keyring` crate to hold the master key via
// the D-Bus Secret Service API (GNOME Keyring / KDE Wallet).
//
// pub struct LinuxSecretServiceCustody;

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Returns the best available custody backend for the current platform.
///
/// - **macOS**: [`MacOsCustody`] (Keychain Services)
/// - **Other platforms**: [`DeviceCustody`] (device-derived software key)
///
/// This is the recommended way to obtain a custody backend. Callers should
/// not need to know which backend is in use.
pub fn platform_custody() -> Box<dyn KeyCustody> {
    #[cfg(target_os = "macos")]
    {
        tracing::info!("using macOS Keychain Services for master key custody");
        Box::new(MacOsCustody::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        tracing::info!("using device-derived master key custody");
        Box::new(DeviceCustody::new())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let custody = DeviceCustody::new();
        let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();

        let wrapped = custody.wrap(&key).unwrap();
        assert_ne!(wrapped, key);

        let unwrapped = custody.unwrap(&wrapped).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn wrap_is_randomized() {
        let custody = DeviceCustody::new();
        let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();

        // Fresh nonce per wrap, so identical inputs produce different blobs.
        let wrapped1 = custody.wrap(&key).unwrap();
        let wrapped2 = custody.wrap(&key).unwrap();
        assert_ne!(wrapped1, wrapped2);

        assert_eq!(custody.unwrap(&wrapped1).unwrap(), key);
        assert_eq!(custody.unwrap(&wrapped2).unwrap(), key);
    }

    #[test]
    fn unwrap_rejects_tampered_blob() {
        let custody = DeviceCustody::new();
        let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();

        let mut wrapped = custody.wrap(&key).unwrap();
        if let Some(byte) = wrapped.last_mut() {
            *byte ^= 0x01;
        }

        let result = custody.unwrap(&wrapped);
        assert!(matches!(result, Err(CryptoError::WrapFailed { .. })));
    }

    #[test]
    fn unwrap_rejects_truncated_blob() {
        let custody = DeviceCustody::new();
        let result = custody.unwrap(&[0u8; 8]);
        assert!(matches!(result, Err(CryptoError::WrapFailed { .. })));
    }

    #[test]
    fn platform_custody_is_usable() {
        let custody = platform_custody();
        // On macOS this is MacOsCustody, elsewhere DeviceCustody. We only
        // check the trait object round-trips on the non-keychain path; the
        // keychain-backed tests below are gated and ignored.
        #[cfg(not(target_os = "macos"))]
        {
            let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();
            let wrapped = custody.wrap(&key).unwrap();
            assert_eq!(custody.unwrap(&wrapped).unwrap(), key);
        }
        #[cfg(target_os = "macos")]
        let _ = custody;
    }

    // -----------------------------------------------------------------------
    // macOS Keychain tests
    // -----------------------------------------------------------------------

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_custody_construction() {
        let custody = MacOsCustody::new();
        assert_eq!(custody.service_name, "com.pinvault.keyset");
        assert_eq!(custody.account_name, "master-key");

        let custom = MacOsCustody::with_names("test.service", "test.account");
        assert_eq!(custom.service_name, "test.service");
        assert_eq!(custom.account_name, "test.account");
    }

    /// Round-trip test for macOS Keychain Services custody.
    ///
    /// This test interacts with the real macOS Keychain. It uses a unique
    /// test-specific service name to avoid interfering with production data.
    /// In CI environments the keychain may not be unlocked, so this test is
    /// ignored by default.
    #[cfg(target_os = "macos")]
    #[test]
    #[ignore = "requires unlocked macOS Keychain — run manually with --ignored"]
    fn macos_custody_roundtrip() {
        use security_framework::passwords::delete_generic_password;

        let service = format!("com.pinvault.keyset.test.{}", std::process::id());
        let custody = MacOsCustody::with_names(&service, "test-master-key");

        let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();
        let wrapped = custody.wrap(&key).unwrap();
        assert_eq!(custody.unwrap(&wrapped).unwrap(), key);

        // Clean up the keychain entry created on first wrap.
        let _ = delete_generic_password(&service, "test-master-key");
    }

    /// Verify that `unwrap` before any wrap reports a missing master key.
    #[cfg(target_os = "macos")]
    #[test]
    #[ignore = "requires unlocked macOS Keychain — run manually with --ignored"]
    fn macos_custody_unwrap_without_master_key() {
        let service = format!("com.pinvault.keyset.test.missing.{}", std::process::id());
        let custody = MacOsCustody::with_names(&service, "nonexistent-key");

        let result = custody.unwrap(&[0u8; 64]);
        assert!(matches!(result, Err(CryptoError::MasterKeyNotFound)));
    }
}
