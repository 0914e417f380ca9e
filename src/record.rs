//! Signature record and broadcast message types.

use crate::error::{SealError, SealResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The last known signature for an item.
///
/// Persisted per node and copied to every peer on broadcast. The public key
/// needed to check it is distributed out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    /// Signature over the SHA-256 digest of the item data, base64 on the wire.
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub signature: Vec<u8>,
    pub signed_by: String,
    /// `sha256:<hex>` of the signed item data.
    #[serde(default)]
    pub item_data_hash: String,
    /// Monotonic per-authority sequence number; 0 for records that predate it.
    #[serde(default)]
    pub version: u64,
}

impl SignatureRecord {
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    pub fn signature_b64(&self) -> String {
        BASE64.encode(&self.signature)
    }

    pub fn to_message(&self, item_id: &str) -> BroadcastMessage {
        BroadcastMessage {
            item_id: item_id.to_string(),
            signature: self.signature_b64(),
            signed_by: self.signed_by.clone(),
            item_data_hash: self.item_data_hash.clone(),
            version: self.version,
        }
    }
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    BASE64.decode(s).map_err(serde::de::Error::custom)
}

/// One-way notification from the authority to every peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    pub item_id: String,
    pub signature: String,
    pub signed_by: String,
    #[serde(default)]
    pub item_data_hash: String,
    #[serde(default)]
    pub version: u64,
}

impl BroadcastMessage {
    /// Decode into a record. Fails if the signature is not valid base64.
    pub fn to_record(&self) -> SealResult<SignatureRecord> {
        let signature = BASE64
            .decode(&self.signature)
            .map_err(|e| SealError::Encoding(format!("invalid signature base64: {e}")))?;
        Ok(SignatureRecord {
            signature,
            signed_by: self.signed_by.clone(),
            item_data_hash: self.item_data_hash.clone(),
            version: self.version,
        })
    }
}
