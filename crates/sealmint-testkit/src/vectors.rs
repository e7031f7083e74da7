//! Wire-format vectors.
//!
//! Fixed JSON documents pinning the storage format: field names, base64
//! binary encoding, and the strict length rules for nonce and tag. A
//! change that stops accepting a valid vector (or starts accepting an
//! invalid one) is a format break.

use sealmint_core::{wire, EncryptedMetadataRecord};

/// A fixed wire-format test case.
#[derive(Debug, Clone)]
pub struct WireVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The JSON document as stored.
    pub json: &'static str,
    /// Whether decoding must succeed.
    pub should_decode: bool,
}

/// Get all wire vectors.
pub fn all_vectors() -> Vec<WireVector> {
    vec![
        WireVector {
            name: "minimal record without promo",
            json: r#"{
                "token_id": "42",
                "owner": "0xowner",
                "user_data": {
                    "capsule": "yv66vg==",
                    "nonce": "AAAAAAAAAAAAAAAA",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "aGVsbG8=",
                    "policy_id": "p1"
                },
                "preview": {"merchant": "Cafe Luna"},
                "user_data_hash": "0000000000000000000000000000000000000000000000000000000000000000"
            }"#,
            should_decode: true,
        },
        WireVector {
            name: "record with promo channel",
            json: r#"{
                "token_id": "7",
                "owner": "0xaaa",
                "user_data": {
                    "capsule": "AQID",
                    "nonce": "AAAAAAAAAAAAAAAA",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "",
                    "policy_id": "p-user"
                },
                "promo_data": {
                    "capsule": "BAUG",
                    "nonce": "AAAAAAAAAAAAAAAA",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "cHJvbW8=",
                    "policy_id": "p-promo",
                    "expires_at": 1900000000
                },
                "preview": null,
                "user_data_hash": "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            }"#,
            should_decode: true,
        },
        WireVector {
            name: "nonce one byte short",
            json: r#"{
                "token_id": "1",
                "owner": "0xbbb",
                "user_data": {
                    "capsule": "AQID",
                    "nonce": "AAAAAAAAAAAAAAA=",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "aGVsbG8=",
                    "policy_id": "p1"
                },
                "preview": null,
                "user_data_hash": "0000000000000000000000000000000000000000000000000000000000000000"
            }"#,
            should_decode: false,
        },
        WireVector {
            name: "ciphertext is not base64",
            json: r#"{
                "token_id": "1",
                "owner": "0xbbb",
                "user_data": {
                    "capsule": "AQID",
                    "nonce": "AAAAAAAAAAAAAAAA",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "not base64!!!",
                    "policy_id": "p1"
                },
                "preview": null,
                "user_data_hash": "0000000000000000000000000000000000000000000000000000000000000000"
            }"#,
            should_decode: false,
        },
        WireVector {
            name: "truncated integrity hash",
            json: r#"{
                "token_id": "1",
                "owner": "0xbbb",
                "user_data": {
                    "capsule": "AQID",
                    "nonce": "AAAAAAAAAAAAAAAA",
                    "tag": "AAAAAAAAAAAAAAAAAAAAAA==",
                    "ciphertext": "aGVsbG8=",
                    "policy_id": "p1"
                },
                "preview": null,
                "user_data_hash": "abcd"
            }"#,
            should_decode: false,
        },
    ]
}

/// Decode a vector's JSON into a record.
pub fn decode_vector(vector: &WireVector) -> sealmint_core::Result<EncryptedMetadataRecord> {
    wire::from_json(vector.json)
}

/// Check every vector against its expected decode outcome.
pub fn verify_all_vectors() -> Vec<(String, bool)> {
    all_vectors()
        .iter()
        .map(|v| {
            let ok = decode_vector(v).is_ok() == v.should_decode;
            (v.name.to_string(), ok)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_behave_as_pinned() {
        for (name, ok) in verify_all_vectors() {
            assert!(ok, "wire vector '{}' changed behavior", name);
        }
    }

    #[test]
    fn test_valid_vector_fields_survive() {
        let vector = &all_vectors()[0];
        let record = decode_vector(vector).unwrap();

        assert_eq!(record.token_id.as_str(), "42");
        assert_eq!(record.owner.as_str(), "0xowner");
        assert_eq!(record.user_data.policy_id.as_str(), "p1");
        assert_eq!(record.user_data.payload.ciphertext_body(), b"hello");
        assert!(record.promo_data.is_none());
    }

    #[test]
    fn test_promo_vector_carries_expiry() {
        let vector = &all_vectors()[1];
        let record = decode_vector(vector).unwrap();

        let promo = record.promo_data.unwrap();
        assert_eq!(promo.expires_at, 1_900_000_000);
        assert_eq!(promo.data.policy_id.as_str(), "p-promo");
    }

    #[test]
    fn test_reencoding_valid_vector_is_stable() {
        let vector = &all_vectors()[0];
        let record = decode_vector(vector).unwrap();

        let json = wire::to_json(&record).unwrap();
        let again = wire::from_json(&json).unwrap();
        assert_eq!(record, again);
    }
}
