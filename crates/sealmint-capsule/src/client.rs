//! The capsule client contract.
//!
//! The threshold network that performs the actual capsule math is an
//! external collaborator; this crate only defines the contract and
//! conforming in-process implementations. Which implementation runs is
//! decided by explicit configuration at construction time, never by
//! environment sniffing inside business logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sealmint_core::{Capsule, Dek, EncryptionNonce, RecipientPublicKey, WalletAddress};

use crate::error::Result;

/// The access condition bound into a capsule: an allow-list of requester
/// identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCondition {
    /// Addresses allowed to request re-encryption.
    pub allowed: Vec<WalletAddress>,
}

impl AccessCondition {
    /// Build a condition allowing the given addresses.
    pub fn allow(addresses: impl IntoIterator<Item = WalletAddress>) -> Self {
        Self {
            allowed: addresses.into_iter().collect(),
        }
    }

    /// Whether the condition permits this requester.
    pub fn permits(&self, requester: &WalletAddress) -> bool {
        self.allowed.contains(requester)
    }
}

/// A DEK wrapped for a specific delegatee.
///
/// Only the holder of the delegatee's secret key can unwrap it; the proxy
/// that produced it never learns the DEK encoding in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedDek {
    /// Ephemeral X25519 public key for the delegatee's ECDH step.
    pub ephemeral_public: [u8; 32],

    /// Nonce for the key-wrap cipher.
    pub nonce: EncryptionNonce,

    /// The DEK, encrypted to the delegatee.
    pub encrypted_dek: Vec<u8>,
}

/// The capsule client: wrap a DEK under an access condition, and later
/// re-encrypt the capsule to a new delegatee.
///
/// # Contract
///
/// - `wrap_key` never persists anything; the returned [`Capsule`] is the
///   only artifact, and `Capsule::hash()` provides a deterministic index.
/// - `reencrypt` is idempotent: the same capsule and delegatee yield an
///   equivalent wrapped key, so timeouts are safe to retry.
/// - A refused condition surfaces as `ReencryptionDenied`; there is no
///   fallback path.
#[async_trait]
pub trait CapsuleClient: Send + Sync {
    /// Wrap a DEK under an access condition, producing an opaque capsule.
    async fn wrap_key(&self, dek: &Dek, condition: &AccessCondition) -> Result<Capsule>;

    /// Re-encrypt a capsule so the delegatee can recover the DEK.
    ///
    /// The requester identity is checked against the capsule's embedded
    /// condition.
    async fn reencrypt(
        &self,
        capsule: &Capsule,
        requester: &WalletAddress,
        delegatee: &RecipientPublicKey,
    ) -> Result<WrappedDek>;
}

#[async_trait]
impl<T: CapsuleClient + ?Sized> CapsuleClient for std::sync::Arc<T> {
    async fn wrap_key(&self, dek: &Dek, condition: &AccessCondition) -> Result<Capsule> {
        (**self).wrap_key(dek, condition).await
    }

    async fn reencrypt(
        &self,
        capsule: &Capsule,
        requester: &WalletAddress,
        delegatee: &RecipientPublicKey,
    ) -> Result<WrappedDek> {
        (**self).reencrypt(capsule, requester, delegatee).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_permits_listed_address() {
        let cond = AccessCondition::allow([WalletAddress::new("0xAAA")]);

        assert!(cond.permits(&WalletAddress::new("0xaaa")));
        assert!(!cond.permits(&WalletAddress::new("0xbbb")));
    }

    #[test]
    fn test_condition_empty_permits_nobody() {
        let cond = AccessCondition::allow([]);
        assert!(!cond.permits(&WalletAddress::new("0xaaa")));
    }
}
