//! Dual-channel encrypted metadata records.
//!
//! One record exists per token. The owner-controlled user channel and the
//! issuer-controlled promotional channel are encrypted under independent
//! DEKs, capsules, and policies, so granting promotional access never
//! exposes the owner's private receipt contents.

use serde::{Deserialize, Serialize};

use crate::engine::EncryptedPayload;
use crate::types::{Capsule, IntegrityHash, PolicyId, TokenId, WalletAddress};

/// Which encrypted channel of a record an operation targets.
///
/// The two channels carry different confidentiality guarantees, so every
/// read-side operation requires an explicit selector; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    /// Owner-controlled receipt contents.
    User,
    /// Issuer-controlled promotional payload.
    Promo,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::User => write!(f, "user"),
            Channel::Promo => write!(f, "promo"),
        }
    }
}

/// One encrypted channel: capsule, ciphertext, and the governing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    /// The wrapped DEK.
    pub capsule: Capsule,

    /// The encrypted payload.
    pub payload: EncryptedPayload,

    /// The policy governing re-encryption of this channel.
    pub policy_id: PolicyId,
}

/// The promotional channel, with its expiry.
///
/// Expiry is checked lazily at read time; the ciphertext is never actively
/// purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoData {
    /// The encrypted promotional payload.
    pub data: ChannelData,

    /// When this promotion stops being readable, Unix seconds.
    pub expires_at: i64,
}

impl PromoData {
    /// Whether the promotion is past its expiry at the given time.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// A per-token metadata record with two independently encrypted channels.
///
/// Records are created on first receipt encryption and never partially
/// deleted, only superseded. `owner` changes exactly once per legitimate
/// transfer; ciphertext is untouched by transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMetadataRecord {
    /// The token this record belongs to.
    pub token_id: TokenId,

    /// Current owner's wallet address.
    pub owner: WalletAddress,

    /// Owner-controlled encrypted channel.
    pub user_data: ChannelData,

    /// Issuer-controlled promotional channel, if any.
    pub promo_data: Option<PromoData>,

    /// Non-sensitive display data. No confidentiality guarantee.
    pub preview: serde_json::Value,

    /// Blake3 integrity hash over `user_data`.
    pub user_data_hash: IntegrityHash,
}

impl EncryptedMetadataRecord {
    /// Create a record for a freshly encrypted token, computing the
    /// integrity hash.
    pub fn new(
        token_id: TokenId,
        owner: WalletAddress,
        user_data: ChannelData,
        preview: serde_json::Value,
    ) -> Self {
        let user_data_hash = compute_integrity_hash(&user_data);
        Self {
            token_id,
            owner,
            user_data,
            promo_data: None,
            preview,
            user_data_hash,
        }
    }

    /// Select a channel at the given time.
    ///
    /// The promotional channel is treated as absent once expired, even
    /// though its ciphertext still exists.
    pub fn channel_at(&self, channel: Channel, now: i64) -> Option<&ChannelData> {
        match channel {
            Channel::User => Some(&self.user_data),
            Channel::Promo => self
                .promo_data
                .as_ref()
                .filter(|p| !p.is_expired(now))
                .map(|p| &p.data),
        }
    }

    /// Whether the record carries a live promotion at the given time.
    pub fn has_live_promotion(&self, now: i64) -> bool {
        self.promo_data.as_ref().is_some_and(|p| !p.is_expired(now))
    }

    /// Recompute the integrity hash and compare with the stored one.
    pub fn verify_integrity(&self) -> bool {
        compute_integrity_hash(&self.user_data) == self.user_data_hash
    }
}

/// Blake3 hash over a channel's capsule, nonce, ciphertext, and policy id.
pub fn compute_integrity_hash(data: &ChannelData) -> IntegrityHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data.capsule.as_bytes());
    hasher.update(data.payload.nonce.as_bytes());
    hasher.update(&data.payload.ciphertext);
    hasher.update(data.policy_id.as_str().as_bytes());
    IntegrityHash(*hasher.finalize().as_bytes())
}
