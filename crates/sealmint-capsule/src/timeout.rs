//! Deadline enforcement for capsule operations.
//!
//! The re-encryption call is the only operation in the delegation core
//! expected to block on network I/O. This decorator bounds it; a timeout
//! surfaces as a retryable error rather than a fatal one, since reencrypt
//! is idempotent.

use std::time::Duration;

use async_trait::async_trait;

use sealmint_core::{Capsule, Dek, RecipientPublicKey, WalletAddress};

use crate::client::{AccessCondition, CapsuleClient, WrappedDek};
use crate::error::{CapsuleError, Result};

/// Wraps any [`CapsuleClient`] with a per-operation deadline.
pub struct TimeoutCapsuleClient<C> {
    inner: C,
    deadline: Duration,
}

impl<C: CapsuleClient> TimeoutCapsuleClient<C> {
    /// Bound every operation on `inner` by `deadline`.
    pub fn new(inner: C, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The configured deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl<C: CapsuleClient> CapsuleClient for TimeoutCapsuleClient<C> {
    async fn wrap_key(&self, dek: &Dek, condition: &AccessCondition) -> Result<Capsule> {
        tokio::time::timeout(self.deadline, self.inner.wrap_key(dek, condition))
            .await
            .map_err(|_| CapsuleError::Timeout(self.deadline))?
    }

    async fn reencrypt(
        &self,
        capsule: &Capsule,
        requester: &WalletAddress,
        delegatee: &RecipientPublicKey,
    ) -> Result<WrappedDek> {
        tokio::time::timeout(
            self.deadline,
            self.inner.reencrypt(capsule, requester, delegatee),
        )
        .await
        .map_err(|_| CapsuleError::Timeout(self.deadline))?
    }
}
