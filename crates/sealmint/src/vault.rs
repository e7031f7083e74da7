//! The Vault: the access-delegation protocol.
//!
//! Composes the encryption engine, capsule client, and stores into the
//! three protocol flows: encrypt-on-write, promotion issuance, and
//! policy-gated re-encryption-on-read. Constructed once at process start
//! with injected dependencies; holds no ambient global state.

use sealmint_capsule::{AccessCondition, CapsuleClient, WrappedDek};
use sealmint_core::{
    engine, CapsuleHash, Channel, ChannelData, EncryptedMetadataRecord, EncryptedPayload,
    Policy, PolicyId, PolicyStatus, PromoData, RecipientPublicKey, TokenId, WalletAddress,
};
use sealmint_store::{MetadataStore, PolicyStore};

use crate::error::{Result, VaultError};

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Whether to verify record integrity hashes on read.
    pub verify_integrity: bool,

    /// Re-encryption limit applied to policies the Vault creates for
    /// promotions.
    pub promo_max_reencryptions: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            verify_integrity: true,
            promo_max_reencryptions: 25,
        }
    }
}

/// The result of a granted re-encryption request.
///
/// Carries the DEK wrapped for the delegatee and the payload exactly as
/// stored: nonce, tag, and ciphertext are unchanged. The requester
/// combines the wrapped key with their secret (the client-side step,
/// outside this core) to recover the plaintext.
#[derive(Debug, Clone)]
pub struct ReencryptionGrant {
    /// The DEK, re-wrapped for the delegatee.
    pub wrapped_dek: WrappedDek,

    /// The untouched encrypted payload.
    pub payload: EncryptedPayload,

    /// Index hash of the capsule that was re-encrypted.
    pub capsule_hash: CapsuleHash,
}

/// The access-delegation protocol over injected stores and capsule client.
///
/// All operations are request-scoped; the stores are the only shared
/// mutable state, so a `Vault` may be shared freely across tasks.
pub struct Vault<M, P, C> {
    metadata: M,
    policies: P,
    capsules: C,
    config: VaultConfig,
}

impl<M, P, C> Vault<M, P, C>
where
    M: MetadataStore,
    P: PolicyStore,
    C: CapsuleClient,
{
    /// Create a new Vault with injected dependencies.
    pub fn new(metadata: M, policies: P, capsules: C, config: VaultConfig) -> Self {
        Self {
            metadata,
            policies,
            capsules,
            config,
        }
    }

    /// The metadata store.
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// The policy store.
    pub fn policies(&self) -> &P {
        &self.policies
    }

    // ─────────────────────────────────────────────────────────────────────
    // Policy Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create or idempotently update a policy.
    pub async fn create_policy(
        &self,
        policy_id: &PolicyId,
        delegatee: &RecipientPublicKey,
        ttl_seconds: u64,
        max_reencryptions: u32,
    ) -> Result<Policy> {
        let policy = self
            .policies
            .create_policy(policy_id, delegatee, ttl_seconds, max_reencryptions)
            .await?;
        tracing::info!(%policy_id, ttl_seconds, max_reencryptions, "policy created");
        Ok(policy)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Encrypt-on-write
    // ─────────────────────────────────────────────────────────────────────

    /// Encrypt a receipt payload and store it as the token's user channel.
    ///
    /// The DEK exists only inside this call: it is generated, wrapped into
    /// a capsule whose allow-list contains the owner, and dropped. The
    /// governing policy must already exist.
    pub async fn encrypt_record(
        &self,
        token_id: &TokenId,
        owner: &WalletAddress,
        plaintext: &[u8],
        preview: serde_json::Value,
        policy_id: &PolicyId,
    ) -> Result<EncryptedMetadataRecord> {
        self.policies
            .get_policy(policy_id)
            .await?
            .ok_or_else(|| VaultError::PolicyNotFound(policy_id.clone()))?;

        let (payload, dek) = engine::encrypt(plaintext)?;

        let condition = AccessCondition::allow([owner.clone()]);
        let capsule = self.capsules.wrap_key(&dek, &condition).await?;
        drop(dek); // zeroized

        let user_data = ChannelData {
            capsule,
            payload,
            policy_id: policy_id.clone(),
        };

        let record = self
            .metadata
            .store_user_data(token_id, owner, user_data, preview)
            .await?;

        tracing::info!(%token_id, %owner, "record encrypted");
        Ok(record)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Promotions
    // ─────────────────────────────────────────────────────────────────────

    /// Attach a promotional payload to an existing record.
    ///
    /// The promotion is encrypted independently of the user channel, under
    /// its own DEK, capsule, and policy, so promotional access never
    /// reaches the owner's private contents. The policy's ttl is derived
    /// from `expires_at`; issuing an already-expired promotion is rejected
    /// as invalid policy parameters.
    pub async fn issue_promotion(
        &self,
        token_id: &TokenId,
        promo_plaintext: &[u8],
        recipient: &RecipientPublicKey,
        recipient_address: &WalletAddress,
        policy_id: &PolicyId,
        expires_at: i64,
    ) -> Result<EncryptedMetadataRecord> {
        if self.metadata.get_by_token(token_id).await?.is_none() {
            return Err(VaultError::RecordNotFound(token_id.clone()));
        }

        let now = now_seconds();
        let ttl_seconds = expires_at.saturating_sub(now).max(0) as u64;
        self.policies
            .create_policy(
                policy_id,
                recipient,
                ttl_seconds,
                self.config.promo_max_reencryptions,
            )
            .await?;

        let (payload, dek) = engine::encrypt(promo_plaintext)?;
        let condition = AccessCondition::allow([recipient_address.clone()]);
        let capsule = self.capsules.wrap_key(&dek, &condition).await?;
        drop(dek);

        let promo = PromoData {
            data: ChannelData {
                capsule,
                payload,
                policy_id: policy_id.clone(),
            },
            expires_at,
        };

        let record = self.metadata.store_promo_data(token_id, promo).await?;
        tracing::info!(%token_id, %recipient_address, expires_at, "promotion issued");
        Ok(record)
    }

    /// Records owned by `owner` that carry a live (unexpired) promotion.
    ///
    /// Expiry is evaluated lazily here; expired ciphertext stays in
    /// storage but is excluded from the listing.
    pub async fn list_promotions(
        &self,
        owner: &WalletAddress,
    ) -> Result<Vec<EncryptedMetadataRecord>> {
        let now = now_seconds();
        let records = self.metadata.get_by_owner(owner).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.has_live_promotion(now))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Re-encryption
    // ─────────────────────────────────────────────────────────────────────

    /// Request re-encryption of a channel's capsule to a new delegatee.
    ///
    /// The channel selector is mandatory: user and promotional data carry
    /// different confidentiality guarantees, so there is no default. On
    /// success the payload is returned untouched; only the key material is
    /// re-wrapped.
    pub async fn request_reencryption(
        &self,
        token_id: &TokenId,
        channel: Channel,
        requester: &WalletAddress,
        delegatee: &RecipientPublicKey,
    ) -> Result<ReencryptionGrant> {
        let now = now_seconds();

        let record = self
            .metadata
            .get_by_token(token_id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound(token_id.clone()))?;

        if self.config.verify_integrity && !record.verify_integrity() {
            return Err(VaultError::IntegrityMismatch(token_id.clone()));
        }

        // An expired promotion is treated as absent, same as no capsule.
        let channel_data = record
            .channel_at(channel, now)
            .filter(|d| !d.capsule.as_bytes().is_empty())
            .ok_or_else(|| VaultError::NotEncrypted {
                token_id: token_id.clone(),
                channel,
            })?;

        let policy = self
            .policies
            .get_policy(&channel_data.policy_id)
            .await?
            .ok_or_else(|| VaultError::PolicyNotFound(channel_data.policy_id.clone()))?;

        match policy.status_at(now) {
            PolicyStatus::Expired => {
                tracing::debug!(policy_id = %policy.policy_id, "re-encryption refused: expired");
                let expired_at = policy.expires_at();
                return Err(VaultError::PolicyExpired {
                    policy_id: policy.policy_id,
                    expired_at,
                });
            }
            PolicyStatus::Exhausted => {
                tracing::debug!(policy_id = %policy.policy_id, "re-encryption refused: exhausted");
                return Err(VaultError::PolicyExhausted {
                    policy_id: policy.policy_id,
                    max_reencryptions: policy.max_reencryptions,
                });
            }
            PolicyStatus::Active => {}
        }

        // Reserve the use before the capsule call. Concurrent requests race
        // on this atomic step in the store, not on the status check above,
        // so the counter can never land past the limit.
        let count = match self.policies.reserve_reencryption(&policy.policy_id).await? {
            Some(count) => count,
            None => {
                return Err(VaultError::PolicyExhausted {
                    policy_id: policy.policy_id,
                    max_reencryptions: policy.max_reencryptions,
                });
            }
        };

        let wrapped_dek = match self
            .capsules
            .reencrypt(&channel_data.capsule, requester, delegatee)
            .await
        {
            Ok(wrapped) => wrapped,
            Err(e) => {
                // A denied or failed capsule call does not consume the limit.
                self.policies
                    .release_reencryption(&policy.policy_id)
                    .await?;
                return Err(e.into());
            }
        };

        tracing::info!(
            %token_id,
            %channel,
            policy_id = %policy.policy_id,
            count,
            "re-encryption granted"
        );

        Ok(ReencryptionGrant {
            wrapped_dek,
            payload: channel_data.payload.clone(),
            capsule_hash: channel_data.capsule.hash(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Load the record for a token.
    pub async fn get_record(&self, token_id: &TokenId) -> Result<EncryptedMetadataRecord> {
        let record = self
            .metadata
            .get_by_token(token_id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound(token_id.clone()))?;

        if self.config.verify_integrity && !record.verify_integrity() {
            return Err(VaultError::IntegrityMismatch(token_id.clone()));
        }

        Ok(record)
    }

    /// Transfer record ownership without touching ciphertext.
    ///
    /// The existing capsules still name the previous owner; the new owner
    /// must be granted decrypt rights through a new policy and
    /// re-encryption. That asymmetry is deliberate.
    pub async fn transfer_ownership(
        &self,
        token_id: &TokenId,
        new_owner: &WalletAddress,
    ) -> Result<EncryptedMetadataRecord> {
        let record = self.metadata.transfer_ownership(token_id, new_owner).await?;
        tracing::info!(%token_id, %new_owner, "ownership transferred");
        Ok(record)
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
