//! In-process capsule client.
//!
//! A single-process stand-in for the threshold network, for deployments
//! and tests without network access. The capsule body carries the DEK
//! encrypted to a service key via ephemeral X25519 ECDH, plus the embedded
//! access condition; re-encryption checks the condition and re-wraps the
//! DEK to the delegatee without exposing it to the caller.
//!
//! The wrap construction follows the usual hybrid pattern: ephemeral ECDH,
//! a Blake3 derive-key step for domain separation, then ChaCha20-Poly1305
//! over the 32-byte DEK.

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use sealmint_core::{engine, Capsule, Dek, EncryptedPayload, EncryptionNonce, RecipientPublicKey, WalletAddress};

use crate::client::{AccessCondition, CapsuleClient, WrappedDek};
use crate::error::{CapsuleError, Result};

const WRAP_CONTEXT: &str = "sealmint-capsule-v1-wrap";

/// An X25519 secret held by a delegatee.
///
/// Lives on the requester's side of the protocol; the capsule client only
/// ever sees the corresponding public key.
pub struct RecipientSecret(StaticSecret);

impl RecipientSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from seed bytes.
    pub fn from_seed(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey(*PublicKey::from(&self.0).as_bytes())
    }

    /// Recover a DEK from a wrapped key produced for this recipient.
    ///
    /// This is the client-side complement of `reencrypt`; it runs on the
    /// requester's machine, outside the delegation core.
    pub fn unwrap_dek(&self, wrapped: &WrappedDek) -> Result<Dek> {
        let shared = self
            .0
            .diffie_hellman(&PublicKey::from(wrapped.ephemeral_public));
        let wrap_key = derive_wrap_key(shared.as_bytes());

        let payload = EncryptedPayload {
            nonce: wrapped.nonce,
            ciphertext: wrapped.encrypted_dek.clone(),
        };
        let dek_bytes = engine::decrypt(&payload, &wrap_key)
            .map_err(|e| CapsuleError::UnwrapFailed(e.to_string()))?;

        dek_from_slice(&dek_bytes)
    }
}

/// Derive the key-wrap key from an ECDH shared secret.
fn derive_wrap_key(shared: &[u8; 32]) -> Dek {
    let mut hasher = blake3::Hasher::new_derive_key(WRAP_CONTEXT);
    hasher.update(shared);
    Dek::from_bytes(*hasher.finalize().as_bytes())
}

fn dek_from_slice(bytes: &[u8]) -> Result<Dek> {
    if bytes.len() != sealmint_core::DEK_LEN {
        return Err(CapsuleError::UnwrapFailed(format!(
            "invalid dek length: expected {}, got {}",
            sealmint_core::DEK_LEN,
            bytes.len()
        )));
    }
    let mut arr = [0u8; sealmint_core::DEK_LEN];
    arr.copy_from_slice(bytes);
    Ok(Dek::from_bytes(arr))
}

/// Encrypt a DEK to a public key via ephemeral ECDH.
fn wrap_to(dek: &Dek, recipient: &PublicKey) -> Result<([u8; 32], EncryptionNonce, Vec<u8>)> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = *PublicKey::from(&ephemeral).as_bytes();
    let shared = ephemeral.diffie_hellman(recipient);
    let wrap_key = derive_wrap_key(shared.as_bytes());

    let payload = engine::encrypt_with(dek.as_bytes(), &wrap_key)
        .map_err(|e| CapsuleError::WrapFailed(e.to_string()))?;

    Ok((ephemeral_public, payload.nonce, payload.ciphertext))
}

/// The opaque capsule body, CBOR-encoded into `Capsule` bytes.
#[derive(Serialize, Deserialize)]
struct CapsuleBody {
    ephemeral_public: [u8; 32],
    nonce: EncryptionNonce,
    encrypted_dek: Vec<u8>,
    condition: AccessCondition,
}

/// In-process implementation of [`CapsuleClient`].
///
/// Holds the service secret that a real deployment would shard across
/// threshold nodes. Stateless per-operation; safe to share across tasks.
pub struct LocalCapsuleClient {
    service_secret: StaticSecret,
}

impl LocalCapsuleClient {
    /// Create a client with a random service key.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self {
            service_secret: StaticSecret::from(bytes),
        }
    }

    /// Create with a deterministic service key from seed.
    pub fn from_seed(bytes: [u8; 32]) -> Self {
        Self {
            service_secret: StaticSecret::from(bytes),
        }
    }

    fn service_public(&self) -> PublicKey {
        PublicKey::from(&self.service_secret)
    }
}

impl Default for LocalCapsuleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapsuleClient for LocalCapsuleClient {
    async fn wrap_key(&self, dek: &Dek, condition: &AccessCondition) -> Result<Capsule> {
        let (ephemeral_public, nonce, encrypted_dek) = wrap_to(dek, &self.service_public())?;

        let body = CapsuleBody {
            ephemeral_public,
            nonce,
            encrypted_dek,
            condition: condition.clone(),
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&body, &mut buf)
            .map_err(|e| CapsuleError::Serialization(e.to_string()))?;

        Ok(Capsule::from_bytes(buf))
    }

    async fn reencrypt(
        &self,
        capsule: &Capsule,
        requester: &WalletAddress,
        delegatee: &RecipientPublicKey,
    ) -> Result<WrappedDek> {
        let body: CapsuleBody = ciborium::from_reader(capsule.as_bytes())
            .map_err(|e| CapsuleError::MalformedCapsule(e.to_string()))?;

        if !body.condition.permits(requester) {
            tracing::debug!(%requester, "capsule condition refused requester");
            return Err(CapsuleError::ReencryptionDenied(format!(
                "requester {} not in capsule allow-list",
                requester
            )));
        }

        // Recover the DEK with the service key, then immediately re-wrap it
        // to the delegatee. The DEK never leaves this call in the clear.
        let shared = self
            .service_secret
            .diffie_hellman(&PublicKey::from(body.ephemeral_public));
        let wrap_key = derive_wrap_key(shared.as_bytes());

        let payload = EncryptedPayload {
            nonce: body.nonce,
            ciphertext: body.encrypted_dek,
        };
        let dek_bytes = engine::decrypt(&payload, &wrap_key)
            .map_err(|e| CapsuleError::MalformedCapsule(e.to_string()))?;
        let dek = dek_from_slice(&dek_bytes)?;

        let (ephemeral_public, nonce, encrypted_dek) =
            wrap_to(&dek, &PublicKey::from(delegatee.0))?;

        Ok(WrappedDek {
            ephemeral_public,
            nonce,
            encrypted_dek,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> WalletAddress {
        WalletAddress::new("0xowner")
    }

    #[tokio::test]
    async fn test_wrap_and_reencrypt_roundtrip() {
        let client = LocalCapsuleClient::new();
        let recipient = RecipientSecret::generate();
        let dek = Dek::generate();
        let dek_bytes = *dek.as_bytes();

        let condition = AccessCondition::allow([owner()]);
        let capsule = client.wrap_key(&dek, &condition).await.unwrap();

        let wrapped = client
            .reencrypt(&capsule, &owner(), &recipient.public_key())
            .await
            .unwrap();

        let recovered = recipient.unwrap_dek(&wrapped).unwrap();
        assert_eq!(recovered.as_bytes(), &dek_bytes);
    }

    #[tokio::test]
    async fn test_reencrypt_denied_for_unlisted_requester() {
        let client = LocalCapsuleClient::new();
        let recipient = RecipientSecret::generate();
        let dek = Dek::generate();

        let condition = AccessCondition::allow([owner()]);
        let capsule = client.wrap_key(&dek, &condition).await.unwrap();

        let result = client
            .reencrypt(
                &capsule,
                &WalletAddress::new("0xintruder"),
                &recipient.public_key(),
            )
            .await;

        assert!(matches!(result, Err(CapsuleError::ReencryptionDenied(_))));
    }

    #[tokio::test]
    async fn test_wrong_recipient_cannot_unwrap() {
        let client = LocalCapsuleClient::new();
        let recipient = RecipientSecret::generate();
        let wrong = RecipientSecret::generate();
        let dek = Dek::generate();

        let capsule = client
            .wrap_key(&dek, &AccessCondition::allow([owner()]))
            .await
            .unwrap();
        let wrapped = client
            .reencrypt(&capsule, &owner(), &recipient.public_key())
            .await
            .unwrap();

        assert!(wrong.unwrap_dek(&wrapped).is_err());
    }

    #[tokio::test]
    async fn test_capsule_alone_reveals_nothing() {
        // Decoding the capsule gives only ciphertext; unwrapping without the
        // service key fails.
        let client = LocalCapsuleClient::new();
        let dek = Dek::generate();
        let capsule = client
            .wrap_key(&dek, &AccessCondition::allow([owner()]))
            .await
            .unwrap();

        let body: CapsuleBody = ciborium::from_reader(capsule.as_bytes()).unwrap();
        let outsider = RecipientSecret::generate();
        let shared = outsider
            .0
            .diffie_hellman(&PublicKey::from(body.ephemeral_public));
        let wrong_key = derive_wrap_key(shared.as_bytes());

        let payload = EncryptedPayload {
            nonce: body.nonce,
            ciphertext: body.encrypted_dek,
        };
        assert!(engine::decrypt(&payload, &wrong_key).is_err());
    }

    #[tokio::test]
    async fn test_garbage_capsule_is_malformed() {
        let client = LocalCapsuleClient::new();
        let recipient = RecipientSecret::generate();

        let result = client
            .reencrypt(
                &Capsule::from_bytes(vec![0xde, 0xad]),
                &owner(),
                &recipient.public_key(),
            )
            .await;

        assert!(matches!(result, Err(CapsuleError::MalformedCapsule(_))));
    }

    #[tokio::test]
    async fn test_reencrypt_idempotent_for_retry() {
        // Two invocations produce different wrappings (fresh ephemerals) but
        // both recover the same DEK.
        let client = LocalCapsuleClient::new();
        let recipient = RecipientSecret::generate();
        let dek = Dek::generate();
        let dek_bytes = *dek.as_bytes();

        let capsule = client
            .wrap_key(&dek, &AccessCondition::allow([owner()]))
            .await
            .unwrap();

        let w1 = client
            .reencrypt(&capsule, &owner(), &recipient.public_key())
            .await
            .unwrap();
        let w2 = client
            .reencrypt(&capsule, &owner(), &recipient.public_key())
            .await
            .unwrap();

        assert_eq!(recipient.unwrap_dek(&w1).unwrap().as_bytes(), &dek_bytes);
        assert_eq!(recipient.unwrap_dek(&w2).unwrap().as_bytes(), &dek_bytes);
    }
}
