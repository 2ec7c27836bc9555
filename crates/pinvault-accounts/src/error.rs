//! Account layer error types.
//!
//! [`AccountError`] is the single error type returned by every public API in
//! this crate. Crypto engine failures pass through transparently so callers
//! can still match on the [`CryptoError`] taxonomy (wrong password vs
//! malformed envelope) when they need to.

use pinvault_crypto::CryptoError;

/// Unified error type for PinVault account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// No stored record exists for the given user name.
    #[error("account not found: user_name={user_name}")]
    AccountNotFound { user_name: String },

    /// The crypto engine rejected the operation: password policy violation,
    /// authentication failure, malformed envelope, or custody fault.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// SQLite error from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A custom store backend failed on read or write.
    #[error("storage error: {reason}")]
    Storage { reason: String },
}

/// Convenience alias used throughout the accounts crate.
pub type Result<T> = std::result::Result<T, AccountError>;
