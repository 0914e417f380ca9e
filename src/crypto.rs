//! Digest and fingerprint helpers

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Prefix carried by every content hash string.
pub const CONTENT_HASH_PREFIX: &str = "sha256:";

/// Compute the raw SHA-256 digest of item data
pub fn digest(content: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.finalize().into()
}

/// Compute SHA-256 hash of content as `sha256:<hex>`
pub fn content_hash(content: &[u8]) -> String {
    format!("{}{}", CONTENT_HASH_PREFIX, hex::encode(digest(content)))
}

/// Bytes actually signed for an item: the item digest followed by the
/// record version, big-endian. Binding the version stops it from being
/// rewritten without invalidating the signature.
pub fn signing_payload(digest: &[u8; 32], version: u64) -> [u8; 40] {
    let mut payload = [0u8; 40];
    payload[..32].copy_from_slice(digest);
    payload[32..].copy_from_slice(&version.to_be_bytes());
    payload
}

/// Recover the raw digest from a `sha256:<hex>` content hash.
pub fn parse_content_hash(hash: &str) -> Option<[u8; 32]> {
    let hex_digest = hash.strip_prefix(CONTENT_HASH_PREFIX)?;
    let bytes = hex::decode(hex_digest).ok()?;
    bytes.try_into().ok()
}

/// Compute fingerprint of raw public key bytes
pub fn key_fingerprint(public_key: &[u8]) -> String {
    format!("SHA256:{}", BASE64.encode(digest(public_key)))
}
