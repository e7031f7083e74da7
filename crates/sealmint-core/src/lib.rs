//! # Sealmint Core
//!
//! Core primitives for the Sealmint encrypted-metadata layer: the hybrid
//! encryption engine, access policies, dual-channel metadata records, and
//! the JSON/base64 storage codec.
//!
//! ## Key Types
//!
//! - [`Dek`] - A transient 256-bit data-encryption key, zeroized on drop
//! - [`EncryptedPayload`] - AEAD ciphertext with nonce and tag
//! - [`Policy`] - A time- and usage-bounded delegation record
//! - [`EncryptedMetadataRecord`] - Per-token record with independent user
//!   and promotional channels
//! - [`Capsule`] - An opaque, policy-bound wrapping of a DEK
//!
//! Encryption happens once per write; delegation later re-wraps the DEK
//! for a new recipient without ever touching the payload ciphertext.

pub mod engine;
pub mod error;
pub mod policy;
pub mod record;
pub mod types;
pub mod wire;

pub use engine::{Dek, EncryptedPayload, EncryptionNonce, DEK_LEN, NONCE_LEN, TAG_LEN};
pub use error::{CoreError, Result};
pub use policy::{valid_policy_params, Policy, PolicyStatus};
pub use record::{
    compute_integrity_hash, Channel, ChannelData, EncryptedMetadataRecord, PromoData,
};
pub use types::{
    Capsule, CapsuleHash, IntegrityHash, PolicyId, RecipientPublicKey, TokenId, WalletAddress,
};
