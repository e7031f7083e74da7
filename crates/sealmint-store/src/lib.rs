//! # Sealmint Store
//!
//! Persistence for the Sealmint delegation layer. Provides trait-based
//! interfaces for policy and metadata storage with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`PolicyStore`] - async trait for policy persistence with idempotent
//!   upsert and an atomic re-encryption counter
//! - [`MetadataStore`] - async trait for per-token encrypted records
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - in-memory storage for tests
//!
//! ## Design Notes
//!
//! - **Idempotent policy upsert**: repeated `create_policy` with the same
//!   id updates attributes, never duplicates identity
//! - **Atomic conditional insert**: merchant resolution is
//!   insert-if-absent, eliminating the look-up-then-insert race
//! - **Wire-format persistence**: records are stored in their JSON/base64
//!   wire shape, so every read re-validates nonce and tag lengths

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Merchant, MetadataStore, PolicyStore};
