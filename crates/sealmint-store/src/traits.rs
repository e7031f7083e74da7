//! Store traits: abstract interfaces for policy and metadata persistence.
//!
//! These traits keep the delegation protocol storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).
//! The only shared mutable state in the system lives behind them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sealmint_core::{
    valid_policy_params, ChannelData, EncryptedMetadataRecord, Policy, PolicyId, PromoData,
    RecipientPublicKey, TokenId, WalletAddress,
};

use crate::error::{Result, StoreError};

/// A logical merchant entity, keyed by its name.
///
/// Resolution is insert-if-absent: two callers racing to create the same
/// merchant must converge on a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    /// Natural identity.
    pub name: String,
    /// When the entity was first created (Unix seconds).
    pub created_at: i64,
}

/// Persistence for access policies.
///
/// # Design Notes
///
/// - **Idempotent upsert**: `create_policy` with an existing id overwrites
///   delegatee/ttl/limit but preserves `created_at` and the usage counter,
///   so retries cannot extend a policy's life or reset its usage.
/// - **Atomic reservation**: `reserve_reencryption` checks the limit and
///   bumps the counter in one atomic step, so two concurrent grants cannot
///   both slip under the limit.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Create or update a policy.
    ///
    /// Validates `ttl_seconds > 0` and `max_reencryptions > 0` before
    /// touching storage; fails with `InvalidPolicyParameters` otherwise.
    async fn create_policy(
        &self,
        policy_id: &PolicyId,
        delegatee: &RecipientPublicKey,
        ttl_seconds: u64,
        max_reencryptions: u32,
    ) -> Result<Policy>;

    /// Write a policy verbatim, including `created_at` and the counter.
    ///
    /// Used by restores and test fixtures that need a back-dated policy;
    /// normal creation goes through `create_policy`.
    async fn put_policy(&self, policy: &Policy) -> Result<()>;

    /// Look up a policy by id.
    async fn get_policy(&self, policy_id: &PolicyId) -> Result<Option<Policy>>;

    /// Atomically reserve one re-encryption use if the limit allows it.
    ///
    /// Returns the new count, or `None` when the counter already reached
    /// `max_reencryptions`. The check and the increment are one atomic
    /// step. Fails with `PolicyNotFound` if no policy exists with the id.
    async fn reserve_reencryption(&self, policy_id: &PolicyId) -> Result<Option<u32>>;

    /// Return a previously reserved use.
    ///
    /// Called when the capsule operation behind a reservation fails, so a
    /// denied or timed-out request does not consume the limit.
    async fn release_reencryption(&self, policy_id: &PolicyId) -> Result<()>;
}

/// Persistence for per-token encrypted metadata records.
///
/// The repository exclusively owns persisted records; the encryption
/// engine and capsule client are stateless utilities around it.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create or update the record for a token.
    ///
    /// Always recomputes and stores the integrity hash of `user_data`.
    /// Any existing promotional channel is preserved.
    async fn store_user_data(
        &self,
        token_id: &TokenId,
        owner: &WalletAddress,
        user_data: ChannelData,
        preview: serde_json::Value,
    ) -> Result<EncryptedMetadataRecord>;

    /// Attach or replace the promotional channel, wholesale.
    ///
    /// Fails with `RecordNotFound` if no record exists for the token.
    async fn store_promo_data(
        &self,
        token_id: &TokenId,
        promo: PromoData,
    ) -> Result<EncryptedMetadataRecord>;

    /// Look up the record for a token.
    async fn get_by_token(&self, token_id: &TokenId) -> Result<Option<EncryptedMetadataRecord>>;

    /// All records currently owned by an address.
    async fn get_by_owner(&self, owner: &WalletAddress) -> Result<Vec<EncryptedMetadataRecord>>;

    /// Update the owner address only.
    ///
    /// Ciphertext is untouched: transfer never re-encrypts, and the old
    /// capsules still point at the old delegatee by design.
    async fn transfer_ownership(
        &self,
        token_id: &TokenId,
        new_owner: &WalletAddress,
    ) -> Result<EncryptedMetadataRecord>;

    /// Resolve a merchant by name, creating it if absent.
    ///
    /// Must be atomic (insert-if-absent), not select-then-insert.
    async fn resolve_merchant(&self, name: &str) -> Result<Merchant>;
}

/// Reject bad policy parameters before any persistence.
pub(crate) fn check_policy_params(ttl_seconds: u64, max_reencryptions: u32) -> Result<()> {
    if !valid_policy_params(ttl_seconds, max_reencryptions) {
        return Err(StoreError::InvalidPolicyParameters {
            ttl_seconds,
            max_reencryptions,
        });
    }
    Ok(())
}
