//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use rand::RngCore;

use sealmint::{LocalCapsuleClient, MemoryStore, Vault, VaultConfig};
use sealmint_capsule::local::RecipientSecret;
use sealmint_core::{EncryptedMetadataRecord, Policy, PolicyId, TokenId, WalletAddress};
use sealmint_store::PolicyStore;

/// A test fixture with a vault over in-memory stores, an owner address,
/// and a delegatee keypair.
pub struct TestFixture {
    pub vault: Vault<MemoryStore, MemoryStore, LocalCapsuleClient>,
    pub owner: WalletAddress,
    pub recipient: RecipientSecret,
}

impl TestFixture {
    /// Create a fixture with random keys.
    pub fn new() -> Self {
        Self {
            vault: Vault::new(
                MemoryStore::new(),
                MemoryStore::new(),
                LocalCapsuleClient::new(),
                VaultConfig::default(),
            ),
            owner: WalletAddress::new("0xowner"),
            recipient: RecipientSecret::generate(),
        }
    }

    /// Create with deterministic keys from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let mut recipient_seed = seed;
        recipient_seed[1] ^= 0xff;
        Self {
            vault: Vault::new(
                MemoryStore::new(),
                MemoryStore::new(),
                LocalCapsuleClient::from_seed(seed),
                VaultConfig::default(),
            ),
            owner: WalletAddress::new("0xowner"),
            recipient: RecipientSecret::from_seed(recipient_seed),
        }
    }

    /// Create a policy delegating to the fixture's recipient.
    pub async fn make_policy(
        &self,
        policy_id: &str,
        ttl_seconds: u64,
        max_reencryptions: u32,
    ) -> sealmint::Result<Policy> {
        self.vault
            .create_policy(
                &PolicyId::new(policy_id),
                &self.recipient.public_key(),
                ttl_seconds,
                max_reencryptions,
            )
            .await
    }

    /// Encrypt a payload for a token under an existing policy, owned by
    /// the fixture's owner.
    pub async fn encrypt_token(
        &self,
        token_id: &str,
        policy_id: &str,
        plaintext: &[u8],
    ) -> sealmint::Result<EncryptedMetadataRecord> {
        self.vault
            .encrypt_record(
                &TokenId::new(token_id),
                &self.owner,
                plaintext,
                serde_json::json!({"merchant": "Cafe Luna", "total": "7.80"}),
                &PolicyId::new(policy_id),
            )
            .await
    }

    /// Move a policy's creation time `seconds` into the past.
    ///
    /// Lets tests exercise expiry without sleeping.
    pub async fn back_date_policy(&self, policy_id: &str, seconds: i64) -> sealmint::Result<()> {
        let id = PolicyId::new(policy_id);
        let mut policy = self
            .vault
            .policies()
            .get_policy(&id)
            .await?
            .ok_or(sealmint::VaultError::PolicyNotFound(id))?;
        policy.created_at -= seconds;
        self.vault.policies().put_policy(&policy).await?;
        Ok(())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple recipient keypairs for multi-party tests.
pub fn multi_party_recipients(count: usize) -> Vec<RecipientSecret> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            // Byte 0 is clamped by X25519; vary a byte that survives.
            seed[1] = i as u8;
            RecipientSecret::from_seed(seed)
        })
        .collect()
}

/// A random token id for tests that need a unique one.
pub fn random_token() -> TokenId {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    TokenId::new(format!("tok-{}", u64::from_be_bytes(bytes)))
}
