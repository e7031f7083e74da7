//! Hybrid encryption engine.
//!
//! Each record payload is encrypted once with a fresh data-encryption key
//! (DEK) using ChaCha20-Poly1305. The DEK itself is never persisted; it is
//! handed to the capsule layer for wrapping and zeroized when dropped.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// DEK length in bytes (256 bits).
pub const DEK_LEN: usize = 32;

/// Nonce length in bytes (96 bits). Fixed; any other length is rejected.
pub const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// A 256-bit data-encryption key.
///
/// Exists only transiently during encrypt/decrypt and capsule wrapping.
/// Zeroized on drop; deliberately not `Clone`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Dek([u8; DEK_LEN]);

impl Dek {
    /// Generate a fresh random DEK.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; DEK_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DEK_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DEK_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Dek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "Dek(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// An encrypted payload: nonce plus ciphertext with the tag appended.
///
/// Produced once per plaintext write and immutable thereafter. The 16-byte
/// Poly1305 tag lives at the end of `ciphertext`; the wire codec splits it
/// into an explicit field at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Nonce used for encryption (unique per DEK).
    pub nonce: EncryptionNonce,

    /// The encrypted data, with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// The ciphertext without the trailing authentication tag.
    pub fn ciphertext_body(&self) -> &[u8] {
        &self.ciphertext[..self.ciphertext.len().saturating_sub(TAG_LEN)]
    }

    /// The trailing authentication tag.
    pub fn tag(&self) -> &[u8] {
        let start = self.ciphertext.len().saturating_sub(TAG_LEN);
        &self.ciphertext[start..]
    }

    /// Reassemble from split body and tag, validating lengths.
    pub fn from_parts(nonce: &[u8], body: &[u8], tag: &[u8]) -> Result<Self> {
        if nonce.len() != NONCE_LEN {
            return Err(CoreError::MalformedCiphertext(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(CoreError::MalformedCiphertext(format!(
                "tag must be {} bytes, got {}",
                TAG_LEN,
                tag.len()
            )));
        }

        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);

        let mut ciphertext = Vec::with_capacity(body.len() + TAG_LEN);
        ciphertext.extend_from_slice(body);
        ciphertext.extend_from_slice(tag);

        Ok(Self {
            nonce: EncryptionNonce(nonce_arr),
            ciphertext,
        })
    }
}

/// Encrypt a plaintext under a fresh DEK.
///
/// Returns the payload and the raw DEK. The caller is responsible for
/// wrapping the DEK into a capsule and dropping it afterwards.
pub fn encrypt(plaintext: &[u8]) -> Result<(EncryptedPayload, Dek)> {
    let dek = Dek::generate();
    let payload = encrypt_with(plaintext, &dek)?;
    Ok((payload, dek))
}

/// Encrypt a plaintext under a caller-provided DEK with a fresh nonce.
pub fn encrypt_with(plaintext: &[u8], dek: &Dek) -> Result<EncryptedPayload> {
    let nonce = EncryptionNonce::generate();
    let cipher = ChaCha20Poly1305::new_from_slice(dek.as_bytes())
        .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Decrypt a payload with the given DEK.
///
/// Fails with [`CoreError::DecryptionError`] on tag mismatch and
/// [`CoreError::MalformedCiphertext`] if the ciphertext is shorter than a
/// tag.
pub fn decrypt(payload: &EncryptedPayload, dek: &Dek) -> Result<Vec<u8>> {
    if payload.ciphertext.len() < TAG_LEN {
        return Err(CoreError::MalformedCiphertext(format!(
            "ciphertext shorter than the {}-byte tag",
            TAG_LEN
        )));
    }

    let cipher = ChaCha20Poly1305::new_from_slice(dek.as_bytes())
        .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(&payload.nonce.0), payload.ciphertext.as_ref())
        .map_err(|_| CoreError::DecryptionError)
}
