//! Error types for the Vault.
//!
//! Denial reasons are precise and never conflated into a generic
//! "unauthorized"; an outer HTTP layer may generalize for external users,
//! but this core does not.

use thiserror::Error;

use sealmint_capsule::CapsuleError;
use sealmint_core::{Channel, CoreError, PolicyId, TokenId};
use sealmint_store::StoreError;

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Encryption/codec error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Capsule client error, including `ReencryptionDenied` from the
    /// backing network and retryable timeouts.
    #[error("capsule error: {0}")]
    Capsule(#[from] CapsuleError),

    /// No record exists for the token.
    #[error("record not found for token {0}")]
    RecordNotFound(TokenId),

    /// The requested channel carries no live capsule.
    #[error("token {token_id} has no encrypted {channel} channel")]
    NotEncrypted { token_id: TokenId, channel: Channel },

    /// The channel references a policy that does not exist.
    #[error("policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// The policy's ttl has elapsed.
    #[error("policy {policy_id} expired at {expired_at}")]
    PolicyExpired { policy_id: PolicyId, expired_at: i64 },

    /// The policy's re-encryption limit is used up.
    #[error("policy {policy_id} exhausted its {max_reencryptions} re-encryptions")]
    PolicyExhausted {
        policy_id: PolicyId,
        max_reencryptions: u32,
    },

    /// The stored user-data hash does not match the channel contents.
    #[error("integrity hash mismatch for token {0}")]
    IntegrityMismatch(TokenId),
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
