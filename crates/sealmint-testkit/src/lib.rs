//! # Sealmint Testkit
//!
//! Testing utilities for Sealmint.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Wire vectors**: Fixed JSON documents pinning the storage format
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up delegation scenarios
//!
//! ## Wire Vectors
//!
//! Wire vectors pin the stored record format:
//!
//! ```rust
//! use sealmint_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok) in verify_all_vectors() {
//!     assert!(ok, "vector {} changed behavior", name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealmint_testkit::generators::{policy_from_params, PolicyParams};
//!
//! proptest! {
//!     #[test]
//!     fn fresh_policies_start_active(params: PolicyParams) {
//!         let policy = policy_from_params(&params);
//!         prop_assert_eq!(policy.reencryption_count, 0);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up delegation scenarios:
//!
//! ```rust,ignore
//! use sealmint_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! fixture.make_policy("p1", 3600, 5).await.unwrap();
//! fixture.encrypt_token("42", "p1", b"receipt contents").await.unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_recipients, random_token, TestFixture};
pub use generators::{policy_from_params, PolicyParams};
pub use vectors::{all_vectors, decode_vector, verify_all_vectors, WireVector};
