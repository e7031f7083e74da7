//! Storage/wire format for metadata records.
//!
//! Records persist as JSON objects with base64-encoded binary fields and
//! Unix-second integer timestamps. Decoding is strict: a nonce that is not
//! 12 bytes or a tag that is not 16 bytes rejects the whole record as
//! malformed before any cryptographic work.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::engine::EncryptedPayload;
use crate::error::{CoreError, Result};
use crate::record::{ChannelData, EncryptedMetadataRecord, PromoData};
use crate::types::{Capsule, IntegrityHash, PolicyId, TokenId, WalletAddress};

/// Wire shape of one encrypted channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChannelData {
    /// Base64 capsule bytes.
    pub capsule: String,
    /// Base64 nonce (12 bytes decoded).
    pub nonce: String,
    /// Base64 authentication tag (16 bytes decoded).
    pub tag: String,
    /// Base64 ciphertext, without the tag.
    pub ciphertext: String,
    /// Governing policy id.
    pub policy_id: String,
}

/// Wire shape of the promotional channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePromoData {
    #[serde(flatten)]
    pub data: WireChannelData,
    /// Expiry, Unix seconds.
    pub expires_at: i64,
}

/// Wire shape of a full metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    pub token_id: String,
    pub owner: String,
    pub user_data: WireChannelData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_data: Option<WirePromoData>,
    /// Free-form display object. No confidentiality guarantee.
    pub preview: serde_json::Value,
    /// Hex Blake3 hash of `user_data`.
    pub user_data_hash: String,
}

fn encode_channel(data: &ChannelData) -> WireChannelData {
    WireChannelData {
        capsule: BASE64.encode(data.capsule.as_bytes()),
        nonce: BASE64.encode(data.payload.nonce.as_bytes()),
        tag: BASE64.encode(data.payload.tag()),
        ciphertext: BASE64.encode(data.payload.ciphertext_body()),
        policy_id: data.policy_id.as_str().to_string(),
    }
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| CoreError::MalformedCiphertext(format!("invalid base64 in {}: {}", field, e)))
}

fn decode_channel(wire: &WireChannelData) -> Result<ChannelData> {
    let capsule = decode_b64("capsule", &wire.capsule)?;
    let nonce = decode_b64("nonce", &wire.nonce)?;
    let tag = decode_b64("tag", &wire.tag)?;
    let body = decode_b64("ciphertext", &wire.ciphertext)?;

    let payload = EncryptedPayload::from_parts(&nonce, &body, &tag)?;

    Ok(ChannelData {
        capsule: Capsule::from_bytes(capsule),
        payload,
        policy_id: PolicyId::new(wire.policy_id.clone()),
    })
}

/// Encode a record into its wire shape.
pub fn encode_record(record: &EncryptedMetadataRecord) -> WireRecord {
    WireRecord {
        token_id: record.token_id.as_str().to_string(),
        owner: record.owner.as_str().to_string(),
        user_data: encode_channel(&record.user_data),
        promo_data: record.promo_data.as_ref().map(|p| WirePromoData {
            data: encode_channel(&p.data),
            expires_at: p.expires_at,
        }),
        preview: record.preview.clone(),
        user_data_hash: record.user_data_hash.to_hex(),
    }
}

/// Decode a wire record, validating all binary field lengths.
pub fn decode_record(wire: &WireRecord) -> Result<EncryptedMetadataRecord> {
    let user_data = decode_channel(&wire.user_data)?;
    let promo_data = wire
        .promo_data
        .as_ref()
        .map(|p| {
            Ok::<_, CoreError>(PromoData {
                data: decode_channel(&p.data)?,
                expires_at: p.expires_at,
            })
        })
        .transpose()?;

    let user_data_hash = IntegrityHash::from_hex(&wire.user_data_hash)
        .map_err(|e| CoreError::DecodingError(format!("invalid user_data_hash: {}", e)))?;

    Ok(EncryptedMetadataRecord {
        token_id: TokenId::new(wire.token_id.clone()),
        owner: WalletAddress::new(&wire.owner),
        user_data,
        promo_data,
        preview: wire.preview.clone(),
        user_data_hash,
    })
}

/// Serialize a record to its JSON storage form.
pub fn to_json(record: &EncryptedMetadataRecord) -> Result<String> {
    serde_json::to_string(&encode_record(record))
        .map_err(|e| CoreError::EncodingError(e.to_string()))
}

/// Parse a record from its JSON storage form.
pub fn from_json(json: &str) -> Result<EncryptedMetadataRecord> {
    let wire: WireRecord =
        serde_json::from_str(json).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    decode_record(&wire)
}
