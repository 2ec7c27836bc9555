//! AES-256-GCM encryption, PBKDF2 key derivation, and salt generation using
//! the `ring` crate.
//!
//! This module provides the cryptographic primitives for the vault engine:
//!
//! - **Salt generation**: fresh 256-bit random salts from the system CSPRNG.
//! - **Key derivation**: PBKDF2-HMAC-SHA256 turning a password/PIN and a
//!   salt into a 256-bit key.
//! - **Session key binding**: HKDF-SHA256 combining the password-derived key
//!   with the long-lived operating key, so neither alone can decrypt data.
//! - **Encryption/decryption**: AES-256-GCM authenticated encryption with
//!   randomly generated 96-bit nonces.
//!
//! # Security Notes
//!
//! - Nonces are generated randomly for each encryption operation. With a
//!   96-bit nonce and random generation, the probability of a collision is
//!   negligible for up to ~2^32 encryptions under the same key.
//! - PBKDF2 iteration count is set to 600,000 as recommended by OWASP (2023).
//!   The count participates in derivation, so changing it orphans previously
//!   written envelopes; bump [`crate::envelope::FORMAT_VERSION`] when
//!   revising it.
//! - Derived keys and session keys are returned in [`Zeroizing`] buffers and
//!   wiped when they leave scope.

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::hkdf;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// Length of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count. 600,000 per OWASP 2023 recommendation for
/// HMAC-SHA256.
const PBKDF2_ITERATIONS: u32 = 600_000;

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

/// Domain-separation label for the HKDF session-key expansion.
const SESSION_KEY_INFO: &[u8] = b"pinvault-session-key-v1";

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A single-use nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` requires a [`NonceSequence`] for sealing operations. Since we
/// generate a fresh random nonce per encryption call, this wrapper ensures
/// each sealing key is used exactly once.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN_BYTES]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Salt generation
// ---------------------------------------------------------------------------

/// Generate a fresh random salt for one encryption operation.
///
/// Salts are not secret; they are stored in the envelope so the same key can
/// be re-derived at decryption time. Uniqueness is a property of the system
/// CSPRNG, not checked here.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivationFailed`] if the system CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| CryptoError::KeyDerivationFailed {
            reason: "failed to generate random salt".into(),
        })?;
    Ok(salt)
}

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`CryptoError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| CryptoError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from `secret` and `salt` via PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same `(secret, salt)` pair always produces the same
/// key, which is what makes decryption possible. The fixed-size salt type
/// makes wrong-salt-length inputs unrepresentable.
pub fn derive_key(secret: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(PBKDF2_ALG, iterations, salt, secret, &mut *key);
    key
}

/// Expand the password-derived key and the keyset operating key into the
/// per-operation AEAD session key.
///
/// HKDF-SHA256 with the operating key as the extraction salt binds both
/// inputs: a leaked operating key alone cannot decrypt stored data, and a
/// password-derived key is useless without the keyset.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivationFailed`] if HKDF expansion fails.
pub fn session_key(derived_key: &[u8], operating_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, operating_key).extract(derived_key);
    let okm = prk
        .expand(&[SESSION_KEY_INFO], hkdf::HKDF_SHA256)
        .map_err(|_| CryptoError::KeyDerivationFailed {
            reason: "HKDF expansion failed".into(),
        })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    okm.fill(&mut *key)
        .map_err(|_| CryptoError::KeyDerivationFailed {
            reason: "HKDF output length mismatch".into(),
        })?;
    Ok(key)
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` with AES-256-GCM using the given 256-bit `key`.
///
/// Returns `(nonce, ciphertext)` where `nonce` is a randomly generated 96-bit
/// value and `ciphertext` includes the 128-bit authentication tag appended by
/// `ring`.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if the key length is wrong or
/// `ring` reports a failure.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<([u8; NONCE_LEN_BYTES], Vec<u8>)> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::EncryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let rng = SystemRandom::new();

    // Generate a random 96-bit nonce.
    let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| CryptoError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;

    let mut sealing_key = SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

    // `ring` encrypts in-place and appends the authentication tag.
    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "encrypted data"
    );

    Ok((nonce_bytes, in_out))
}

/// Decrypt `ciphertext` (which includes the GCM tag) using the given `nonce`
/// and 256-bit `key`.
///
/// Returns the decrypted plaintext.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] if the key is wrong or the
/// ciphertext has been tampered with. The two causes are indistinguishable.
pub fn decrypt(nonce: &[u8; NONCE_LEN_BYTES], ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Internal(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| {
        CryptoError::Internal("failed to create AES-256-GCM key".into())
    })?;

    let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(*nonce));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let result = plaintext.to_vec();

    tracing::trace!(
        ciphertext_len = ciphertext.len(),
        plaintext_len = result.len(),
        "decrypted data"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
