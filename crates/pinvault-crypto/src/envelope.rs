//! Envelope framing for encrypted payloads.
//!
//! An envelope is the single persisted unit per account:
//!
//! ```text
//! base64( [1 byte: format version]
//!         [32 bytes: PBKDF2 salt]
//!         [12 bytes: AES-256-GCM nonce]
//!         [remaining: ciphertext + 16-byte tag] )
//! ```
//!
//! The codec has no cryptographic role; it only frames fixed lengths so the
//! salt and nonce can be recovered at decryption time. The leading version
//! byte lets a future algorithm change roll out without guessing at stored
//! bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::crypto::{NONCE_LEN_BYTES, SALT_LEN, TAG_LEN};
use crate::error::{CryptoError, Result};

/// Current envelope format version.
///
/// Version 1: PBKDF2-HMAC-SHA256 (600k iterations) + HKDF-SHA256 binding +
/// AES-256-GCM.
pub const FORMAT_VERSION: u8 = 1;

/// Minimum decoded envelope size: version + salt + nonce + GCM tag.
const MIN_LEN: usize = 1 + SALT_LEN + NONCE_LEN_BYTES + TAG_LEN;

/// Parsed contents of an envelope.
#[derive(Debug)]
pub struct Envelope {
    /// The salt the payload's key was derived with.
    pub salt: [u8; SALT_LEN],
    /// The AEAD nonce used for this payload.
    pub nonce: [u8; NONCE_LEN_BYTES],
    /// Ciphertext including the GCM authentication tag.
    pub ciphertext: Vec<u8>,
}

/// Serialize an envelope to its base64 wire form.
pub fn seal(salt: &[u8; SALT_LEN], nonce: &[u8; NONCE_LEN_BYTES], ciphertext: &[u8]) -> String {
    let mut body = Vec::with_capacity(1 + SALT_LEN + NONCE_LEN_BYTES + ciphertext.len());
    body.push(FORMAT_VERSION);
    body.extend_from_slice(salt);
    body.extend_from_slice(nonce);
    body.extend_from_slice(ciphertext);
    BASE64.encode(body)
}

/// Parse an envelope from its base64 wire form.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedEnvelope`] if the input is not valid
/// base64 or the decoded body is too short, and
/// [`CryptoError::UnsupportedVersion`] if the leading version byte is
/// unknown.
pub fn open(encoded: &str) -> Result<Envelope> {
    let body = BASE64
        .decode(encoded.trim())
        .map_err(|e| CryptoError::MalformedEnvelope {
            reason: format!("invalid base64: {e}"),
        })?;

    if body.len() < MIN_LEN {
        return Err(CryptoError::MalformedEnvelope {
            reason: format!("envelope is {} bytes, expected at least {}", body.len(), MIN_LEN),
        });
    }

    let version = body[0];
    if version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion { version });
    }

    let (salt_bytes, rest) = body[1..].split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN_BYTES);

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(salt_bytes);
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    nonce.copy_from_slice(nonce_bytes);

    Ok(Envelope {
        salt,
        nonce,
        ciphertext: ciphertext.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
