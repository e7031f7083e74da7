//! Access policies: time- and usage-bounded delegation records.
//!
//! A policy names the delegatee allowed to receive re-encrypted capsules
//! and bounds how long and how often that delegation may be exercised.

use serde::{Deserialize, Serialize};

use crate::types::{PolicyId, RecipientPublicKey};

/// A named, time- and usage-bounded authorization record.
///
/// Identity (`policy_id`) is immutable once created; attributes may be
/// overwritten by a later upsert with the same id. `created_at` and
/// `reencryption_count` survive upserts so a retry can neither extend a
/// policy's life nor reset its usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy identifier.
    pub policy_id: PolicyId,

    /// The delegatee allowed to receive re-encrypted capsules.
    pub delegatee: RecipientPublicKey,

    /// Seconds from `created_at` until the policy expires.
    pub ttl_seconds: u64,

    /// Maximum number of re-encryptions this policy permits.
    pub max_reencryptions: u32,

    /// Creation time, Unix seconds.
    pub created_at: i64,

    /// Re-encryptions performed so far.
    pub reencryption_count: u32,
}

/// Lifecycle state of a policy at a point in time.
///
/// There is no transition back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStatus {
    /// Within ttl and under the re-encryption limit.
    Active,
    /// ttl elapsed.
    Expired,
    /// Re-encryption count reached the limit.
    Exhausted,
}

impl Policy {
    /// Create a fresh policy with a zero usage counter.
    pub fn new(
        policy_id: PolicyId,
        delegatee: RecipientPublicKey,
        ttl_seconds: u64,
        max_reencryptions: u32,
        created_at: i64,
    ) -> Self {
        Self {
            policy_id,
            delegatee,
            ttl_seconds,
            max_reencryptions,
            created_at,
            reencryption_count: 0,
        }
    }

    /// When this policy expires, Unix seconds.
    pub fn expires_at(&self) -> i64 {
        self.created_at.saturating_add(self.ttl_seconds as i64)
    }

    /// Status at the given time.
    ///
    /// Expiry is checked before exhaustion, matching the protocol's
    /// validation order.
    pub fn status_at(&self, now: i64) -> PolicyStatus {
        if now > self.expires_at() {
            PolicyStatus::Expired
        } else if self.reencryption_count >= self.max_reencryptions {
            PolicyStatus::Exhausted
        } else {
            PolicyStatus::Active
        }
    }
}

/// Check that policy parameters are acceptable.
///
/// Both bounds must be strictly positive; a zero ttl or limit would create
/// a policy that can never be exercised.
pub fn valid_policy_params(ttl_seconds: u64, max_reencryptions: u32) -> bool {
    ttl_seconds > 0 && max_reencryptions > 0
}
