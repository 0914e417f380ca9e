//! Item signing.

use crate::crypto;
use crate::keys::KeyPair;
use crate::record::SignatureRecord;
use tracing::debug;

/// Produces signature records over item data.
///
/// Holds no state and performs no authorization; callers decide who may sign.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemSigner;

impl ItemSigner {
    pub fn new() -> Self {
        Self
    }

    /// Digest `item_data`, sign the digest together with `version` and
    /// package the record.
    pub fn sign(
        &self,
        item_data: &[u8],
        signed_by: &str,
        keypair: &KeyPair,
        version: u64,
    ) -> SignatureRecord {
        let digest = crypto::digest(item_data);
        let signature = keypair.sign(&crypto::signing_payload(&digest, version));
        let item_data_hash = crypto::content_hash(item_data);

        debug!(signed_by, version, hash = %item_data_hash, "signed item data");

        SignatureRecord {
            signature,
            signed_by: signed_by.to_string(),
            item_data_hash,
            version,
        }
    }
}
