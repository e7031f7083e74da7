//! Error types for Sealmint core.

use thiserror::Error;

/// Core errors that can occur during encryption and codec operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// AEAD authentication failed: tampering or wrong key. Always fatal,
    /// never retried.
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionError,

    #[error("encryption failed: {0}")]
    EncryptionError(String),

    /// A stored field failed structural validation (bad nonce/tag length,
    /// invalid base64). Rejected before any cryptographic work.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
