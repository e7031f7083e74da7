//! # Sealmint Capsule
//!
//! The boundary to the threshold network that wraps and re-encrypts
//! data-encryption keys.
//!
//! ## Overview
//!
//! The delegation core never implements the threshold math; it depends
//! only on the [`CapsuleClient`] contract:
//!
//! - **wrap_key**: seal a DEK under an access condition into an opaque
//!   [`Capsule`]
//! - **reencrypt**: transform a capsule so a new delegatee can recover the
//!   DEK, without the proxy ever exposing it
//!
//! ## Implementations
//!
//! - [`LocalCapsuleClient`] - in-process stand-in (X25519 + ChaCha20-Poly1305)
//! - [`TimeoutCapsuleClient`] - deadline decorator for network-backed
//!   clients; timeouts are retryable
//!
//! The backend is chosen by explicit [`CapsuleBackend`] configuration at
//! construction time.
//!
//! [`Capsule`]: sealmint_core::Capsule

pub mod client;
pub mod error;
pub mod local;
pub mod timeout;

use std::sync::Arc;
use std::time::Duration;

pub use client::{AccessCondition, CapsuleClient, WrappedDek};
pub use error::{CapsuleError, Result};
pub use local::{LocalCapsuleClient, RecipientSecret};
pub use timeout::TimeoutCapsuleClient;

/// Which capsule backend to construct.
///
/// Selection is explicit configuration; nothing in this crate inspects the
/// process environment.
#[derive(Debug, Clone)]
pub enum CapsuleBackend {
    /// In-process stand-in with a random service key.
    Local,
    /// In-process stand-in with a deterministic service key.
    LocalSeeded([u8; 32]),
    /// In-process stand-in behind a per-operation deadline.
    LocalWithDeadline(Duration),
}

/// Build a capsule client for the configured backend.
pub fn build_client(backend: &CapsuleBackend) -> Arc<dyn CapsuleClient> {
    match backend {
        CapsuleBackend::Local => Arc::new(LocalCapsuleClient::new()),
        CapsuleBackend::LocalSeeded(seed) => Arc::new(LocalCapsuleClient::from_seed(*seed)),
        CapsuleBackend::LocalWithDeadline(deadline) => {
            Arc::new(TimeoutCapsuleClient::new(LocalCapsuleClient::new(), *deadline))
        }
    }
}
