//! Account-level orchestration of the crypto engine.
//!
//! [`AccountManager`] sequences encryption, decryption, and storage into the
//! three flows callers use: save, load, and change-password. It holds no
//! state of its own beyond the engine and store handles; every call derives
//! its own ephemeral key material and discards it afterward.
//!
//! All three operations block on PBKDF2 by design. Concurrent calls for the
//! same user name are not arbitrated here; callers that need it must
//! serialize access per user name.

use pinvault_crypto::CryptoManager;

use crate::error::Result;
use crate::store::AccountStore;

/// Save/load/change-password flows over one account store.
///
/// # Example
///
/// ```rust,no_run
/// use pinvault_accounts::{AccountManager, MemoryStore};
/// use pinvault_crypto::CryptoManager;
///
/// # fn example() -> pinvault_accounts::Result<()> {
/// let crypto = CryptoManager::open(std::path::Path::new("data"));
/// let manager = AccountManager::new(crypto, Box::new(MemoryStore::new()));
///
/// manager.save("alice", "1234", b"secret-note")?;
/// let note = manager.load("alice", "1234")?;
/// assert_eq!(note, b"secret-note");
///
/// assert!(manager.change_password("alice", "1234", "5678"));
/// # Ok(())
/// # }
/// ```
pub struct AccountManager {
    crypto: CryptoManager,
    store: Box<dyn AccountStore>,
}

impl AccountManager {
    /// Create a manager over `crypto` and `store`.
    pub fn new(crypto: CryptoManager, store: Box<dyn AccountStore>) -> Self {
        Self { crypto, store }
    }

    /// Encrypt `data` under `password` and store the envelope for
    /// `user_name`.
    ///
    /// A duplicate save for the same user name overwrites the previous
    /// envelope.
    ///
    /// # Errors
    ///
    /// Returns [`pinvault_crypto::CryptoError::PasswordTooShort`] on a
    /// policy violation and propagates store write failures. The plaintext
    /// is never handed to the store.
    pub fn save(&self, user_name: &str, password: &str, data: &[u8]) -> Result<()> {
        let envelope = self.crypto.encrypt_data(password, data)?;
        self.store.put(user_name, &envelope)?;

        tracing::info!(user_name, "saved account data");
        Ok(())
    }

    /// Load and decrypt the data stored for `user_name`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::AccountNotFound`] if no record exists,
    /// [`pinvault_crypto::CryptoError::AuthenticationFailed`] on a wrong
    /// password or tampered envelope, and
    /// [`pinvault_crypto::CryptoError::MalformedEnvelope`] if the stored
    /// bytes cannot be parsed.
    ///
    /// [`AccountError::AccountNotFound`]: crate::error::AccountError::AccountNotFound
    pub fn load(&self, user_name: &str, password: &str) -> Result<Vec<u8>> {
        let envelope = self.store.get(user_name)?;
        let data = self.crypto.decrypt_data(password, &envelope)?;

        tracing::debug!(user_name, "loaded account data");
        Ok(data)
    }

    /// Re-encrypt the data stored for `user_name` under `new_password`,
    /// with a freshly generated salt.
    ///
    /// Every internal failure (missing account, wrong old password, corrupt
    /// envelope, policy violation, storage fault) collapses to `false`.
    /// The store is written only after decryption and re-encryption both
    /// succeed, so a failed call leaves the old envelope untouched.
    /// Plaintext stays inside this call; it is never returned or stored.
    pub fn change_password(&self, user_name: &str, old_password: &str, new_password: &str) -> bool {
        let result: Result<()> = (|| {
            let envelope = self.store.get(user_name)?;
            let data = self.crypto.decrypt_data(old_password, &envelope)?;
            let reencrypted = self.crypto.encrypt_data(new_password, &data)?;
            self.store.put(user_name, &reencrypted)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                tracing::info!(user_name, "changed account password");
                true
            }
            Err(error) => {
                tracing::warn!(user_name, %error, "password change failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pinvault_crypto::{CryptoError, DeviceCustody, Keyset};

    use super::*;
    use crate::error::AccountError;
    use crate::store::MemoryStore;

    fn test_manager(dir: &std::path::Path) -> (AccountManager, Arc<MemoryStore>) {
        let crypto = CryptoManager::new(
            Keyset::default_path(dir),
            Box::new(DeviceCustody::new()),
        );
        let store = Arc::new(MemoryStore::new());
        (AccountManager::new(crypto, Box::new(store.clone())), store)
    }

    #[test]
    fn end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();
        assert_eq!(manager.load("alice", "1234").unwrap(), b"secret-note");

        let result = manager.load("alice", "wrong-password");
        assert!(matches!(
            result,
            Err(AccountError::Crypto(CryptoError::AuthenticationFailed))
        ));

        assert!(manager.change_password("alice", "1234", "5678"));
        assert_eq!(manager.load("alice", "5678").unwrap(), b"secret-note");

        let result = manager.load("alice", "1234");
        assert!(matches!(
            result,
            Err(AccountError::Crypto(CryptoError::AuthenticationFailed))
        ));
    }

    #[test]
    fn load_missing_account_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _store) = test_manager(dir.path());

        let result = manager.load("nobody", "1234");
        assert!(matches!(
            result,
            Err(AccountError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn save_rejects_short_password() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        let result = manager.save("alice", "123", b"secret-note");
        assert!(matches!(
            result,
            Err(AccountError::Crypto(CryptoError::PasswordTooShort { .. }))
        ));

        // Nothing reached the store.
        assert!(store.get("alice").is_err());
    }

    #[test]
    fn duplicate_saves_overwrite_and_differ() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();
        let envelope1 = store.get("alice").unwrap();

        manager.save("alice", "1234", b"secret-note").unwrap();
        let envelope2 = store.get("alice").unwrap();

        // Fresh salt per save: identical inputs, different envelopes.
        assert_ne!(envelope1, envelope2);
        assert_eq!(manager.load("alice", "1234").unwrap(), b"secret-note");
    }

    #[test]
    fn change_password_with_wrong_old_password_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();
        let before = store.get("alice").unwrap();

        assert!(!manager.change_password("alice", "wrong-password", "5678"));

        // Stored envelope is byte-for-byte unchanged.
        let after = store.get("alice").unwrap();
        assert_eq!(before, after);

        // And the old password still works.
        assert_eq!(manager.load("alice", "1234").unwrap(), b"secret-note");
    }

    #[test]
    fn change_password_for_missing_account_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _store) = test_manager(dir.path());

        assert!(!manager.change_password("nobody", "1234", "5678"));
    }

    #[test]
    fn change_password_rejects_short_new_password() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();
        let before = store.get("alice").unwrap();

        assert!(!manager.change_password("alice", "1234", "56"));
        assert_eq!(store.get("alice").unwrap(), before);
    }

    #[test]
    fn change_password_uses_a_fresh_salt() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();
        let before = store.get("alice").unwrap();

        assert!(manager.change_password("alice", "1234", "1234"));
        let after = store.get("alice").unwrap();

        // Same password both sides still re-encrypts under a new salt.
        assert_ne!(before, after);
        assert_eq!(manager.load("alice", "1234").unwrap(), b"secret-note");
    }

    #[test]
    fn corrupt_stored_envelope_fails_closed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = test_manager(dir.path());

        manager.save("alice", "1234", b"secret-note").unwrap();

        store.put("alice", "@@@corrupted@@@").unwrap();
        let result = manager.load("alice", "1234");
        assert!(matches!(
            result,
            Err(AccountError::Crypto(CryptoError::MalformedEnvelope { .. }))
        ));

        // ChangePassword collapses the same failure to false.
        assert!(!manager.change_password("alice", "1234", "5678"));
    }
}
