//! Crypto engine error types.
//!
//! Every public API in this crate surfaces errors through [`CryptoError`],
//! the single error type for the engine.  Each variant carries enough context
//! for callers to decide how to handle the failure without inspecting opaque
//! strings.
//!
//! Callers that need to tell "wrong password" apart from "corrupt data" can
//! match [`CryptoError::AuthenticationFailed`] against
//! [`CryptoError::MalformedEnvelope`].  The account layer deliberately
//! collapses both during password changes.

/// Unified error type for the PinVault crypto engine.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    // -- Caller input -------------------------------------------------------
    /// The supplied password or PIN is shorter than the minimum policy
    /// length.  Raised before any cryptographic work happens.
    #[error("password/PIN must contain {min} or more characters")]
    PasswordTooShort { min: usize },

    // -- Cryptographic failures ---------------------------------------------
    /// AEAD tag verification failed.  Covers wrong password, corrupted
    /// ciphertext, and tampering; the causes are intentionally
    /// indistinguishable.
    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    /// Encryption failed (e.g. invalid key length, RNG failure).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Key derivation failed (e.g. salt generation or HKDF expansion fault).
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    // -- Envelope framing ---------------------------------------------------
    /// The stored envelope cannot be parsed: bad base64 or a body too short
    /// to contain the salt, nonce, and tag.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// The envelope carries a format version this build does not understand.
    #[error("unsupported envelope version: {version}")]
    UnsupportedVersion { version: u8 },

    // -- Key custody --------------------------------------------------------
    /// No master key exists in the custody backend.
    #[error("master key not found in custody backend")]
    MasterKeyNotFound,

    /// Wrapping or unwrapping operating-key material failed.
    #[error("key custody wrap/unwrap failed: {reason}")]
    WrapFailed { reason: String },

    /// The custody backend is unavailable or unsupported on this platform.
    #[error("key custody unavailable: {reason}")]
    CustodyUnavailable { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// I/O error from keyset file operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.  Prefer a typed variant whenever possible.
    #[error("internal crypto error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crypto crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
