//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealmint_core::{Capsule, Policy, PolicyId, RecipientPublicKey, TokenId, WalletAddress};

/// Generate a random token id.
pub fn token_id() -> impl Strategy<Value = TokenId> {
    "[0-9]{1,12}".prop_map(TokenId::new)
}

/// Generate a random wallet address.
pub fn wallet_address() -> impl Strategy<Value = WalletAddress> {
    "0x[0-9a-f]{40}".prop_map(WalletAddress::new)
}

/// Generate a random policy id.
pub fn policy_id() -> impl Strategy<Value = PolicyId> {
    "p-[a-z0-9]{1,16}".prop_map(PolicyId::new)
}

/// Generate a random recipient public key.
pub fn recipient_public_key() -> impl Strategy<Value = RecipientPublicKey> {
    any::<[u8; 32]>().prop_map(RecipientPublicKey::from_bytes)
}

/// Generate random capsule bytes.
pub fn capsule(max_len: usize) -> impl Strategy<Value = Capsule> {
    prop::collection::vec(any::<u8>(), 1..=max_len).prop_map(Capsule::from_bytes)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a valid ttl in seconds.
pub fn ttl_seconds() -> impl Strategy<Value = u64> {
    1u64..=86_400 * 365
}

/// Generate a valid re-encryption limit.
pub fn max_reencryptions() -> impl Strategy<Value = u32> {
    1u32..=1000
}

/// Generate a reasonable creation timestamp.
pub fn created_at() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 4
}

/// Parameters for generating a policy.
#[derive(Debug, Clone)]
pub struct PolicyParams {
    pub policy_id: PolicyId,
    pub delegatee: RecipientPublicKey,
    pub ttl_seconds: u64,
    pub max_reencryptions: u32,
    pub created_at: i64,
}

impl Arbitrary for PolicyParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            policy_id(),
            recipient_public_key(),
            ttl_seconds(),
            max_reencryptions(),
            created_at(),
        )
            .prop_map(|(policy_id, delegatee, ttl_seconds, max_reencryptions, created_at)| {
                PolicyParams {
                    policy_id,
                    delegatee,
                    ttl_seconds,
                    max_reencryptions,
                    created_at,
                }
            })
            .boxed()
    }
}

/// Build a policy from parameters.
pub fn policy_from_params(params: &PolicyParams) -> Policy {
    Policy::new(
        params.policy_id.clone(),
        params.delegatee,
        params.ttl_seconds,
        params.max_reencryptions,
        params.created_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealmint_core::{engine, wire, ChannelData, EncryptedMetadataRecord, PolicyStatus};

    proptest! {
        #[test]
        fn test_policy_never_active_past_expiry(params: PolicyParams, after in 1i64..=1_000_000) {
            let policy = policy_from_params(&params);
            let status = policy.status_at(policy.expires_at().saturating_add(after));
            prop_assert_eq!(status, PolicyStatus::Expired);
        }

        #[test]
        fn test_policy_never_active_at_limit(params: PolicyParams) {
            let mut policy = policy_from_params(&params);
            policy.reencryption_count = policy.max_reencryptions;
            prop_assert_ne!(policy.status_at(policy.created_at), PolicyStatus::Active);
        }

        #[test]
        fn test_fresh_policy_active_within_ttl(params: PolicyParams) {
            let policy = policy_from_params(&params);
            prop_assert_eq!(policy.status_at(policy.created_at), PolicyStatus::Active);
            prop_assert_eq!(policy.status_at(policy.expires_at()), PolicyStatus::Active);
        }

        #[test]
        fn test_wire_survives_arbitrary_payloads(
            token in token_id(),
            owner in wallet_address(),
            pid in policy_id(),
            cap in capsule(256),
            body in payload(512),
        ) {
            let (encrypted, dek) = engine::encrypt(&body).unwrap();
            let record = EncryptedMetadataRecord::new(
                token,
                owner,
                ChannelData {
                    capsule: cap,
                    payload: encrypted,
                    policy_id: pid,
                },
                serde_json::Value::Null,
            );

            let recovered = wire::from_json(&wire::to_json(&record).unwrap()).unwrap();
            prop_assert_eq!(&recovered, &record);

            // Decryption still authenticates after the trip.
            let plaintext = engine::decrypt(&recovered.user_data.payload, &dek).unwrap();
            prop_assert_eq!(plaintext, body);
        }
    }
}
