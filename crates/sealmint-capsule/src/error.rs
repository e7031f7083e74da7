//! Error types for the capsule client boundary.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during capsule operations.
#[derive(Debug, Error)]
pub enum CapsuleError {
    /// The backing network refused to re-encrypt; the access condition was
    /// not satisfied. Never silently downgraded.
    #[error("re-encryption denied: {0}")]
    ReencryptionDenied(String),

    /// Key wrapping failed.
    #[error("key wrap failed: {0}")]
    WrapFailed(String),

    /// The capsule bytes could not be interpreted.
    #[error("malformed capsule: {0}")]
    MalformedCapsule(String),

    /// A wrapped DEK could not be recovered with the presented secret.
    #[error("dek unwrap failed: {0}")]
    UnwrapFailed(String),

    /// The operation exceeded its deadline. Retryable: re-invoking with the
    /// same capsule and delegatee yields an equivalent wrapped key.
    #[error("capsule operation timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CapsuleError {
    /// Whether the caller may safely retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapsuleError::Timeout(_))
    }
}

/// Result type for capsule operations.
pub type Result<T> = std::result::Result<T, CapsuleError>;
