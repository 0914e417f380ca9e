//! Signature verification with tamper feedback.

use crate::crypto;
use crate::keys::PublicKey;
use crate::record::SignatureRecord;
use std::fmt;
use tracing::debug;

/// Why a verification came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyDetail {
    Valid,
    /// No record, or a record with empty signature bytes.
    NoSignature,
    /// The record's stored content hash does not match the item data.
    ///
    /// The hash field itself is not signed, so this check can only turn a
    /// signature that would otherwise verify into a false negative.
    HashMismatch,
    /// The signature bytes could not be interpreted at all.
    Malformed(String),
    /// Parsed fine but does not match the item data under this key.
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub signer_identity: Option<String>,
    pub detail: VerifyDetail,
}

impl VerificationResult {
    fn unsigned() -> Self {
        Self {
            is_valid: false,
            signer_identity: None,
            detail: VerifyDetail::NoSignature,
        }
    }

    fn verdict(record: &SignatureRecord, detail: VerifyDetail) -> Self {
        Self {
            is_valid: detail == VerifyDetail::Valid,
            signer_identity: Some(record.signed_by.clone()),
            detail,
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.detail, &self.signer_identity) {
            (VerifyDetail::Valid, Some(signer)) => {
                write!(f, "Signature is valid! Signed by {signer}")
            }
            (VerifyDetail::NoSignature, _) => write!(f, "No signature found."),
            (VerifyDetail::HashMismatch, _) => {
                write!(f, "Signature is invalid! Item data was modified")
            }
            (VerifyDetail::Malformed(reason), _) => {
                write!(f, "Signature is invalid! ({reason})")
            }
            _ => write!(f, "Signature is invalid!"),
        }
    }
}

/// Checks records against item data and a known public key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify `record` over `item_data`. Never fails; every outcome is a verdict.
    pub fn verify(
        &self,
        item_data: &[u8],
        record: Option<&SignatureRecord>,
        public_key: &PublicKey,
    ) -> VerificationResult {
        let Some(record) = record.filter(|r| r.is_signed()) else {
            return VerificationResult::unsigned();
        };

        if record.signature.len() != ed25519_dalek::SIGNATURE_LENGTH {
            let reason = format!(
                "expected {} signature bytes, got {}",
                ed25519_dalek::SIGNATURE_LENGTH,
                record.signature.len()
            );
            debug!(signed_by = %record.signed_by, %reason, "malformed signature");
            return VerificationResult::verdict(record, VerifyDetail::Malformed(reason));
        }

        if !record.item_data_hash.is_empty()
            && record.item_data_hash != crypto::content_hash(item_data)
        {
            debug!(signed_by = %record.signed_by, "content hash mismatch");
            return VerificationResult::verdict(record, VerifyDetail::HashMismatch);
        }

        let payload = crypto::signing_payload(&crypto::digest(item_data), record.version);
        let detail = if public_key.verify(&payload, &record.signature) {
            VerifyDetail::Valid
        } else {
            VerifyDetail::Mismatch
        };
        debug!(signed_by = %record.signed_by, ?detail, "verified record");
        VerificationResult::verdict(record, detail)
    }

    /// Check that `record` was issued under `public_key` for the digest in its
    /// own content hash and for its own version, without the item data.
    ///
    /// Used to decide whether a record's version can be trusted for ordering.
    pub fn authenticate(&self, record: &SignatureRecord, public_key: &PublicKey) -> bool {
        let Some(digest) = crypto::parse_content_hash(&record.item_data_hash) else {
            return false;
        };
        public_key.verify(
            &crypto::signing_payload(&digest, record.version),
            &record.signature,
        )
    }
}
