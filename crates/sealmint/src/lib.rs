//! # Sealmint
//!
//! The unified API for the Sealmint encrypted-metadata layer: hybrid
//! encryption of per-token receipt data behind policy-gated, time- and
//! usage-bounded re-encryption delegation.
//!
//! ## Overview
//!
//! A record is encrypted once at creation: a fresh DEK encrypts the
//! payload, and the DEK is wrapped into an opaque capsule bound to an
//! access condition. Later, an authorized party asks the [`Vault`] to
//! re-encrypt the capsule to their public key; the payload ciphertext is
//! never touched and the DEK is never exposed to the proxy.
//!
//! Every record carries two independent channels - owner-controlled user
//! data and issuer-controlled promotional data - encrypted under separate
//! DEKs, capsules, and policies.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealmint::{Vault, VaultConfig};
//! use sealmint::capsule::LocalCapsuleClient;
//! use sealmint::core::{Channel, PolicyId, RecipientPublicKey, TokenId, WalletAddress};
//! use sealmint::store::MemoryStore;
//!
//! async fn example() {
//!     let vault = Vault::new(
//!         MemoryStore::new(),
//!         MemoryStore::new(),
//!         LocalCapsuleClient::new(),
//!         VaultConfig::default(),
//!     );
//!
//!     let owner = WalletAddress::new("0xowner");
//!     let policy_id = PolicyId::new("p1");
//!     let delegatee = RecipientPublicKey::from_bytes([0u8; 32]);
//!
//!     vault
//!         .create_policy(&policy_id, &delegatee, 3600, 5)
//!         .await
//!         .unwrap();
//!     vault
//!         .encrypt_record(
//!             &TokenId::new("42"),
//!             &owner,
//!             b"receipt contents",
//!             serde_json::json!({"merchant": "Cafe Luna"}),
//!             &policy_id,
//!         )
//!         .await
//!         .unwrap();
//!
//!     let grant = vault
//!         .request_reencryption(&TokenId::new("42"), Channel::User, &owner, &delegatee)
//!         .await
//!         .unwrap();
//!     let _ = grant;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealmint::core` - primitives (engine, records, policies, wire codec)
//! - `sealmint::capsule` - the capsule client boundary
//! - `sealmint::store` - persistence traits and backends

pub mod error;
pub mod vault;

// Re-export component crates
pub use sealmint_capsule as capsule;
pub use sealmint_core as core;
pub use sealmint_store as store;

// Re-export main types for convenience
pub use error::{Result, VaultError};
pub use vault::{ReencryptionGrant, Vault, VaultConfig};

// Re-export commonly used component types
pub use sealmint_capsule::{AccessCondition, CapsuleClient, LocalCapsuleClient, WrappedDek};
pub use sealmint_core::{
    Channel, EncryptedMetadataRecord, Policy, PolicyId, PolicyStatus, RecipientPublicKey, TokenId,
    WalletAddress,
};
pub use sealmint_store::{MemoryStore, MetadataStore, PolicyStore, SqliteStore};
