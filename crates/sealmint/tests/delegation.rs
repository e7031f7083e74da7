//! End-to-end delegation protocol tests.
//!
//! Exercises the full flow against the in-memory stores and the local
//! capsule client: encrypt-on-write, policy-gated re-encryption,
//! promotions, and ownership transfer. Expiry is tested by back-dating
//! policies through the store rather than sleeping.

use sealmint::capsule::local::RecipientSecret;
use sealmint::core::{engine, Channel, PolicyId, TokenId, WalletAddress};
use sealmint::{
    CapsuleClient, LocalCapsuleClient, MemoryStore, MetadataStore, PolicyStore, Vault,
    VaultConfig, VaultError,
};
use sealmint_capsule::CapsuleError;

fn make_vault() -> Vault<MemoryStore, MemoryStore, LocalCapsuleClient> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Vault::new(
        MemoryStore::new(),
        MemoryStore::new(),
        LocalCapsuleClient::new(),
        VaultConfig::default(),
    )
}

fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

async fn encrypt_sample(
    vault: &Vault<MemoryStore, MemoryStore, LocalCapsuleClient>,
    token: &str,
    owner: &WalletAddress,
    policy: &str,
    delegatee: &RecipientSecret,
    plaintext: &[u8],
) {
    vault
        .create_policy(&PolicyId::new(policy), &delegatee.public_key(), 3600, 5)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new(token),
            owner,
            plaintext,
            serde_json::json!({"merchant": "Cafe Luna", "total": "7.80"}),
            &PolicyId::new(policy),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn full_roundtrip_through_reencryption() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();
    let plaintext = b"2 coffees, 1 croissant, 9.30 EUR";

    encrypt_sample(&vault, "42", &owner, "p1", &recipient, plaintext).await;

    let grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();

    // Client-side step: unwrap the DEK and decrypt the untouched payload.
    let dek = recipient.unwrap_dek(&grant.wrapped_dek).unwrap();
    let decrypted = engine::decrypt(&grant.payload, &dek).unwrap();
    assert_eq!(decrypted, plaintext);

    // The wrapped key is not the DEK encoding itself.
    assert_ne!(
        grant.wrapped_dek.encrypted_dek.as_slice(),
        dek.as_bytes().as_slice()
    );
}

#[tokio::test]
async fn reencryption_fails_after_ttl() {
    // The scenario from the protocol description: p1 with ttl 3600 works
    // immediately, then fails once the clock is 3601 seconds past creation.
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &owner, "p1", &recipient, b"payload").await;

    vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();

    // Move the policy's creation 3601 seconds into the past.
    let mut policy = vault
        .policies()
        .get_policy(&PolicyId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    policy.created_at -= 3601;
    vault.policies().put_policy(&policy).await.unwrap();

    let result = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await;

    assert!(matches!(result, Err(VaultError::PolicyExpired { .. })));
}

/// Capsule client that yields to the scheduler mid-operation, widening the
/// window between the policy status check and the counter update.
struct YieldingClient(LocalCapsuleClient);

#[async_trait::async_trait]
impl CapsuleClient for YieldingClient {
    async fn wrap_key(
        &self,
        dek: &sealmint::core::Dek,
        condition: &sealmint::AccessCondition,
    ) -> sealmint_capsule::Result<sealmint::core::Capsule> {
        self.0.wrap_key(dek, condition).await
    }

    async fn reencrypt(
        &self,
        capsule: &sealmint::core::Capsule,
        requester: &WalletAddress,
        delegatee: &sealmint::core::RecipientPublicKey,
    ) -> sealmint_capsule::Result<sealmint::WrappedDek> {
        tokio::task::yield_now().await;
        self.0.reencrypt(capsule, requester, delegatee).await
    }
}

#[tokio::test]
async fn concurrent_requests_cannot_exceed_the_limit() {
    use std::sync::Arc;

    let vault = Arc::new(Vault::new(
        MemoryStore::new(),
        MemoryStore::new(),
        YieldingClient(LocalCapsuleClient::new()),
        VaultConfig::default(),
    ));
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();
    let recipient_pk = recipient.public_key();

    vault
        .create_policy(&PolicyId::new("p1"), &recipient_pk, 3600, 1)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new("7"),
            &owner,
            b"payload",
            serde_json::Value::Null,
            &PolicyId::new("p1"),
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let vault = vault.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            vault
                .request_reencryption(&TokenId::new("7"), Channel::User, &owner, &recipient_pk)
                .await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(VaultError::PolicyExhausted {
                max_reencryptions: 1,
                ..
            }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(granted, 1);
    let policy = vault
        .policies()
        .get_policy(&PolicyId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(policy.reencryption_count, 1);
}

#[tokio::test]
async fn reencryption_fails_once_exhausted() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    vault
        .create_policy(&PolicyId::new("p-tight"), &recipient.public_key(), 3600, 2)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new("7"),
            &owner,
            b"payload",
            serde_json::Value::Null,
            &PolicyId::new("p-tight"),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        vault
            .request_reencryption(
                &TokenId::new("7"),
                Channel::User,
                &owner,
                &recipient.public_key(),
            )
            .await
            .unwrap();
    }

    let result = vault
        .request_reencryption(
            &TokenId::new("7"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await;

    assert!(matches!(
        result,
        Err(VaultError::PolicyExhausted {
            max_reencryptions: 2,
            ..
        })
    ));
}

#[tokio::test]
async fn denied_request_does_not_consume_the_limit() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let intruder = WalletAddress::new("0xintruder");
    let recipient = RecipientSecret::generate();

    vault
        .create_policy(&PolicyId::new("p1"), &recipient.public_key(), 3600, 1)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new("7"),
            &owner,
            b"payload",
            serde_json::Value::Null,
            &PolicyId::new("p1"),
        )
        .await
        .unwrap();

    // Not on the capsule's allow-list: denied by the client.
    let denied = vault
        .request_reencryption(
            &TokenId::new("7"),
            Channel::User,
            &intruder,
            &recipient.public_key(),
        )
        .await;
    assert!(matches!(
        denied,
        Err(VaultError::Capsule(CapsuleError::ReencryptionDenied(_)))
    ));

    // The single permitted use is still available to the owner.
    vault
        .request_reencryption(
            &TokenId::new("7"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn channels_are_independent() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let owner_key = RecipientSecret::generate();
    let shopper = WalletAddress::new("0xshopper");
    let shopper_key = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &owner, "p-user", &owner_key, b"private receipt").await;
    vault
        .issue_promotion(
            &TokenId::new("42"),
            b"10% off your next order",
            &shopper_key.public_key(),
            &shopper,
            &PolicyId::new("p-promo"),
            now_seconds() + 86_400,
        )
        .await
        .unwrap();

    let user_grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &owner_key.public_key(),
        )
        .await
        .unwrap();
    let promo_grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::Promo,
            &shopper,
            &shopper_key.public_key(),
        )
        .await
        .unwrap();

    let user_dek = owner_key.unwrap_dek(&user_grant.wrapped_dek).unwrap();
    let promo_dek = shopper_key.unwrap_dek(&promo_grant.wrapped_dek).unwrap();

    // Each DEK opens its own channel...
    assert_eq!(
        engine::decrypt(&user_grant.payload, &user_dek).unwrap(),
        b"private receipt"
    );
    assert_eq!(
        engine::decrypt(&promo_grant.payload, &promo_dek).unwrap(),
        b"10% off your next order"
    );

    // ...and never the other one.
    assert!(engine::decrypt(&promo_grant.payload, &user_dek).is_err());
    assert!(engine::decrypt(&user_grant.payload, &promo_dek).is_err());

    // The promo requester cannot reach the user channel either: the user
    // capsule's allow-list names only the owner.
    let cross = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &shopper,
            &shopper_key.public_key(),
        )
        .await;
    assert!(matches!(
        cross,
        Err(VaultError::Capsule(CapsuleError::ReencryptionDenied(_)))
    ));
}

#[tokio::test]
async fn transfer_keeps_ciphertext_and_old_capsule() {
    let vault = make_vault();
    let alice = WalletAddress::new("0xalice");
    let bob = WalletAddress::new("0xbob");
    let recipient = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &alice, "p1", &recipient, b"alice's receipt").await;

    let before = vault.get_record(&TokenId::new("42")).await.unwrap();
    vault
        .transfer_ownership(&TokenId::new("42"), &bob)
        .await
        .unwrap();
    let after = vault.get_record(&TokenId::new("42")).await.unwrap();

    // Ciphertext byte-identical; only the owner changed.
    assert_eq!(
        before.user_data.payload.ciphertext,
        after.user_data.payload.ciphertext
    );
    assert_eq!(after.owner, bob);

    // The capsule still names Alice: Bob is denied until granted anew.
    let bob_attempt = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &bob,
            &recipient.public_key(),
        )
        .await;
    assert!(matches!(
        bob_attempt,
        Err(VaultError::Capsule(CapsuleError::ReencryptionDenied(_)))
    ));

    let alice_attempt = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &alice,
            &recipient.public_key(),
        )
        .await;
    assert!(alice_attempt.is_ok());
}

#[tokio::test]
async fn expired_promotion_is_absent_but_not_purged() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let owner_key = RecipientSecret::generate();
    let shopper = WalletAddress::new("0xshopper");
    let shopper_key = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &owner, "p-user", &owner_key, b"receipt").await;
    vault
        .issue_promotion(
            &TokenId::new("42"),
            b"flash sale",
            &shopper_key.public_key(),
            &shopper,
            &PolicyId::new("p-promo"),
            now_seconds() + 3600,
        )
        .await
        .unwrap();

    assert_eq!(vault.list_promotions(&owner).await.unwrap().len(), 1);

    // Force the promotion into the past without touching its ciphertext.
    let mut record = vault.get_record(&TokenId::new("42")).await.unwrap();
    let mut promo = record.promo_data.take().unwrap();
    promo.expires_at = now_seconds() - 10;
    vault
        .metadata()
        .store_promo_data(&TokenId::new("42"), promo)
        .await
        .unwrap();

    // Excluded from listings...
    assert!(vault.list_promotions(&owner).await.unwrap().is_empty());

    // ...treated as absent for re-encryption...
    let result = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::Promo,
            &shopper,
            &shopper_key.public_key(),
        )
        .await;
    assert!(matches!(result, Err(VaultError::NotEncrypted { .. })));

    // ...but the ciphertext still exists in storage.
    let stored = vault
        .metadata()
        .get_by_token(&TokenId::new("42"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.promo_data.is_some());
}

#[tokio::test]
async fn missing_record_and_policy_are_precise_errors() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    let no_record = vault
        .request_reencryption(
            &TokenId::new("404"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await;
    assert!(matches!(no_record, Err(VaultError::RecordNotFound(_))));

    let no_policy = vault
        .encrypt_record(
            &TokenId::new("1"),
            &owner,
            b"x",
            serde_json::Value::Null,
            &PolicyId::new("missing"),
        )
        .await;
    assert!(matches!(no_policy, Err(VaultError::PolicyNotFound(_))));

    let no_promo_target = vault
        .issue_promotion(
            &TokenId::new("404"),
            b"promo",
            &recipient.public_key(),
            &owner,
            &PolicyId::new("p"),
            now_seconds() + 100,
        )
        .await;
    assert!(matches!(
        no_promo_target,
        Err(VaultError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn promotion_absent_without_issuance() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &owner, "p1", &recipient, b"payload").await;

    let result = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::Promo,
            &owner,
            &recipient.public_key(),
        )
        .await;
    assert!(matches!(
        result,
        Err(VaultError::NotEncrypted {
            channel: Channel::Promo,
            ..
        })
    ));
}

#[tokio::test]
async fn tampered_record_is_refused_on_read() {
    let vault = make_vault();
    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    encrypt_sample(&vault, "42", &owner, "p1", &recipient, b"payload").await;

    // Corrupt the stored ciphertext behind the vault's back. The store
    // recomputes the integrity hash on write, so the grant still goes
    // through; the AEAD tag is the last line of defense.
    let mut record = vault.get_record(&TokenId::new("42")).await.unwrap();
    record.user_data.payload.ciphertext[0] ^= 0xff;
    vault
        .metadata()
        .store_user_data(&TokenId::new("42"), &owner, record.user_data, record.preview)
        .await
        .unwrap();

    let grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();
    let dek = recipient.unwrap_dek(&grant.wrapped_dek).unwrap();
    assert!(engine::decrypt(&grant.payload, &dek).is_err());
}

#[tokio::test]
async fn works_with_configured_capsule_backend() {
    use sealmint::capsule::{build_client, CapsuleBackend};
    use std::time::Duration;

    let backend = CapsuleBackend::LocalWithDeadline(Duration::from_secs(5));
    let vault = Vault::new(
        MemoryStore::new(),
        MemoryStore::new(),
        build_client(&backend),
        VaultConfig::default(),
    );

    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    vault
        .create_policy(&PolicyId::new("p1"), &recipient.public_key(), 3600, 5)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new("42"),
            &owner,
            b"behind a deadline",
            serde_json::Value::Null,
            &PolicyId::new("p1"),
        )
        .await
        .unwrap();

    let grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();

    let dek = recipient.unwrap_dek(&grant.wrapped_dek).unwrap();
    assert_eq!(
        engine::decrypt(&grant.payload, &dek).unwrap(),
        b"behind a deadline"
    );
}

#[tokio::test]
async fn works_against_sqlite_backend() {
    use sealmint::SqliteStore;

    let dir = tempfile::tempdir().unwrap();
    let metadata = SqliteStore::open(dir.path().join("m.db")).unwrap();
    let policies = SqliteStore::open(dir.path().join("p.db")).unwrap();
    let vault = Vault::new(
        metadata,
        policies,
        LocalCapsuleClient::new(),
        VaultConfig::default(),
    );

    let owner = WalletAddress::new("0xowner");
    let recipient = RecipientSecret::generate();

    vault
        .create_policy(&PolicyId::new("p1"), &recipient.public_key(), 3600, 5)
        .await
        .unwrap();
    vault
        .encrypt_record(
            &TokenId::new("42"),
            &owner,
            b"persisted receipt",
            serde_json::json!({"merchant": "Deli"}),
            &PolicyId::new("p1"),
        )
        .await
        .unwrap();

    let grant = vault
        .request_reencryption(
            &TokenId::new("42"),
            Channel::User,
            &owner,
            &recipient.public_key(),
        )
        .await
        .unwrap();

    let dek = recipient.unwrap_dek(&grant.wrapped_dek).unwrap();
    assert_eq!(
        engine::decrypt(&grant.payload, &dek).unwrap(),
        b"persisted receipt"
    );
}
