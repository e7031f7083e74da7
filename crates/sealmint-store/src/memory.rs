//! In-memory implementation of the store traits.
//!
//! Primarily for testing. Same semantics as SQLite but nothing persists
//! past the store's lifetime.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sealmint_core::{
    compute_integrity_hash, ChannelData, EncryptedMetadataRecord, Policy, PolicyId, PromoData,
    RecipientPublicKey, TokenId, WalletAddress,
};

use crate::error::{Result, StoreError};
use crate::traits::{check_policy_params, Merchant, MetadataStore, PolicyStore};

/// In-memory store implementing both [`PolicyStore`] and [`MetadataStore`].
///
/// Thread-safe via RwLock; all data is lost on drop.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    policies: HashMap<PolicyId, Policy>,
    records: HashMap<TokenId, EncryptedMetadataRecord>,
    merchants: HashMap<String, Merchant>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                policies: HashMap::new(),
                records: HashMap::new(),
                merchants: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn create_policy(
        &self,
        policy_id: &PolicyId,
        delegatee: &RecipientPublicKey,
        ttl_seconds: u64,
        max_reencryptions: u32,
    ) -> Result<Policy> {
        check_policy_params(ttl_seconds, max_reencryptions)?;

        let mut inner = self.inner.write().unwrap();
        let policy = match inner.policies.get(policy_id) {
            // Upsert: identity, creation time, and usage survive; the
            // delegation attributes are overwritten.
            Some(existing) => Policy {
                policy_id: policy_id.clone(),
                delegatee: *delegatee,
                ttl_seconds,
                max_reencryptions,
                created_at: existing.created_at,
                reencryption_count: existing.reencryption_count,
            },
            None => Policy::new(
                policy_id.clone(),
                *delegatee,
                ttl_seconds,
                max_reencryptions,
                now_seconds(),
            ),
        };

        inner.policies.insert(policy_id.clone(), policy.clone());
        tracing::debug!(%policy_id, ttl_seconds, max_reencryptions, "policy upserted");
        Ok(policy)
    }

    async fn put_policy(&self, policy: &Policy) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .policies
            .insert(policy.policy_id.clone(), policy.clone());
        Ok(())
    }

    async fn get_policy(&self, policy_id: &PolicyId) -> Result<Option<Policy>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.policies.get(policy_id).cloned())
    }

    async fn reserve_reencryption(&self, policy_id: &PolicyId) -> Result<Option<u32>> {
        let mut inner = self.inner.write().unwrap();
        let policy = inner
            .policies
            .get_mut(policy_id)
            .ok_or_else(|| StoreError::PolicyNotFound(policy_id.clone()))?;

        // Check and increment under one write lock.
        if policy.reencryption_count >= policy.max_reencryptions {
            return Ok(None);
        }
        policy.reencryption_count += 1;
        Ok(Some(policy.reencryption_count))
    }

    async fn release_reencryption(&self, policy_id: &PolicyId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let policy = inner
            .policies
            .get_mut(policy_id)
            .ok_or_else(|| StoreError::PolicyNotFound(policy_id.clone()))?;

        policy.reencryption_count = policy.reencryption_count.saturating_sub(1);
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn store_user_data(
        &self,
        token_id: &TokenId,
        owner: &WalletAddress,
        user_data: ChannelData,
        preview: serde_json::Value,
    ) -> Result<EncryptedMetadataRecord> {
        let mut inner = self.inner.write().unwrap();

        let record = match inner.records.get(token_id) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.owner = owner.clone();
                updated.user_data_hash = compute_integrity_hash(&user_data);
                updated.user_data = user_data;
                updated.preview = preview;
                updated
            }
            None => EncryptedMetadataRecord::new(
                token_id.clone(),
                owner.clone(),
                user_data,
                preview,
            ),
        };

        inner.records.insert(token_id.clone(), record.clone());
        Ok(record)
    }

    async fn store_promo_data(
        &self,
        token_id: &TokenId,
        promo: PromoData,
    ) -> Result<EncryptedMetadataRecord> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(token_id)
            .ok_or_else(|| StoreError::RecordNotFound(token_id.clone()))?;

        record.promo_data = Some(promo);
        Ok(record.clone())
    }

    async fn get_by_token(&self, token_id: &TokenId) -> Result<Option<EncryptedMetadataRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.records.get(token_id).cloned())
    }

    async fn get_by_owner(&self, owner: &WalletAddress) -> Result<Vec<EncryptedMetadataRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .records
            .values()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect())
    }

    async fn transfer_ownership(
        &self,
        token_id: &TokenId,
        new_owner: &WalletAddress,
    ) -> Result<EncryptedMetadataRecord> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(token_id)
            .ok_or_else(|| StoreError::RecordNotFound(token_id.clone()))?;

        record.owner = new_owner.clone();
        tracing::debug!(%token_id, %new_owner, "ownership transferred");
        Ok(record.clone())
    }

    async fn resolve_merchant(&self, name: &str) -> Result<Merchant> {
        let mut inner = self.inner.write().unwrap();
        // Single write lock covers check and insert, so concurrent callers
        // converge on one entity.
        let merchant = inner
            .merchants
            .entry(name.to_string())
            .or_insert_with(|| Merchant {
                name: name.to_string(),
                created_at: now_seconds(),
            });
        Ok(merchant.clone())
    }
}

/// Get current time in Unix seconds.
fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}
