//! Error types for the store module.

use thiserror::Error;

use sealmint_core::{CoreError, PolicyId, TokenId};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Policy parameters rejected before any persistence.
    #[error("invalid policy parameters: ttl_seconds={ttl_seconds}, max_reencryptions={max_reencryptions} (both must be > 0)")]
    InvalidPolicyParameters {
        ttl_seconds: u64,
        max_reencryptions: u32,
    },

    /// No record exists for the token.
    #[error("record not found for token {0}")]
    RecordNotFound(TokenId),

    /// No policy exists with the id.
    #[error("policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// Record codec failure (including malformed stored ciphertext).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
