//! Ed25519 key types and operations.
//!
//! Keys are encoded as `name:base64(bytes)` so that a node can keep its
//! secret across restarts and hand the public half to peers out of band.

use crate::crypto;
use crate::error::{SealError, SealResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Signature algorithm used for item keys.
///
/// Ed25519 sits at the 128-bit security level, above 2048-bit RSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    #[default]
    Ed25519,
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
        }
    }

    fn secret_len(&self) -> usize {
        match self {
            KeyAlgorithm::Ed25519 => ed25519_dalek::SECRET_KEY_LENGTH,
        }
    }

    fn public_len(&self) -> usize {
        match self {
            KeyAlgorithm::Ed25519 => ed25519_dalek::PUBLIC_KEY_LENGTH,
        }
    }
}

/// Split `name:base64` and decode the payload, checking its length.
fn decode_encoded(s: &str, expected_len: usize) -> SealResult<(String, Vec<u8>)> {
    let (name, b64) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| SealError::Key("expected 'name:base64' format".to_string()))?;

    let bytes = BASE64
        .decode(b64)
        .map_err(|e| SealError::Key(format!("invalid base64: {e}")))?;

    if bytes.len() != expected_len {
        return Err(SealError::Key(format!(
            "expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }

    Ok((name.to_string(), bytes))
}

/// The private half. Never leaves the node that generated it.
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            inner: SigningKey::generate(&mut rng),
        }
    }

    pub fn from_encoded(s: &str) -> SealResult<(String, Self)> {
        let (name, bytes) = decode_encoded(s, KeyAlgorithm::Ed25519.secret_len())?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SealError::Key("invalid secret key bytes".to_string()))?;
        Ok((
            name,
            Self {
                inner: SigningKey::from_bytes(&secret),
            },
        ))
    }

    pub fn to_encoded(&self, name: &str) -> String {
        format!("{name}:{}", BASE64.encode(self.inner.as_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.verifying_key(),
        }
    }

    fn sign(&self, digest: &[u8]) -> Vec<u8> {
        self.inner.sign(digest).to_bytes().to_vec()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// The distributable half, used by every verifying party.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    pub fn from_encoded(s: &str) -> SealResult<(String, Self)> {
        let (name, bytes) = decode_encoded(s, KeyAlgorithm::Ed25519.public_len())?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SealError::Key("invalid public key bytes".to_string()))?;
        let inner = VerifyingKey::from_bytes(&key)
            .map_err(|e| SealError::Key(format!("invalid public key: {e}")))?;
        Ok((name, Self { inner }))
    }

    pub fn to_encoded(&self, name: &str) -> String {
        format!("{name}:{}", BASE64.encode(self.inner.as_bytes()))
    }

    pub fn fingerprint(&self) -> String {
        crypto::key_fingerprint(self.inner.as_bytes())
    }

    /// Check `signature` over `digest`.
    ///
    /// Total over all byte inputs: a signature of the wrong length or one
    /// that fails to parse is reported as `false`, same as a mismatch.
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        let Ok(bytes) = <[u8; 64]>::try_from(signature) else {
            debug!(len = signature.len(), "signature has wrong length");
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        self.inner.verify(digest, &signature).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = BASE64.encode(self.inner.as_bytes());
        write!(f, "PublicKey({}...)", &b64[..8])
    }
}

/// A node's signing identity: key name plus both halves.
pub struct KeyPair {
    pub name: String,
    pub algorithm: KeyAlgorithm,
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate(name: impl Into<String>) -> Self {
        Self::generate_with(name, KeyAlgorithm::default())
    }

    pub fn generate_with(name: impl Into<String>, algorithm: KeyAlgorithm) -> Self {
        let secret = match algorithm {
            KeyAlgorithm::Ed25519 => SecretKey::generate(),
        };
        let public = secret.public_key();
        let keypair = Self {
            name: name.into(),
            algorithm,
            secret,
            public,
        };
        info!(
            name = %keypair.name,
            algorithm = algorithm.name(),
            fingerprint = %keypair.public.fingerprint(),
            "generated keypair"
        );
        keypair
    }

    pub fn from_encoded_secret(s: &str) -> SealResult<Self> {
        let (name, secret) = SecretKey::from_encoded(s)?;
        let public = secret.public_key();
        Ok(Self {
            name,
            algorithm: KeyAlgorithm::Ed25519,
            secret,
            public,
        })
    }

    pub fn encoded_secret(&self) -> String {
        self.secret.to_encoded(&self.name)
    }

    pub fn encoded_public(&self) -> String {
        self.public.to_encoded(&self.name)
    }

    /// Sign a digest with the private half.
    pub fn sign(&self, digest: &[u8]) -> Vec<u8> {
        self.secret.sign(digest)
    }

    /// Load the encoded secret at `path`, or generate one and write it there.
    pub fn load_or_generate(
        path: &Path,
        name: &str,
        algorithm: KeyAlgorithm,
    ) -> SealResult<Self> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path)?;
            let keypair = Self::from_encoded_secret(&encoded)?;
            info!(
                path = %path.display(),
                fingerprint = %keypair.public.fingerprint(),
                "loaded keypair"
            );
            return Ok(keypair);
        }

        let keypair = Self::generate_with(name, algorithm);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_secret(path, &keypair.encoded_secret())?;
        info!(path = %path.display(), "wrote new secret key");
        Ok(keypair)
    }
}

/// Write a secret key file readable only by its owner (0600 on unix).
fn write_secret(path: &Path, contents: &str) -> SealResult<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("public", &self.public)
            .finish()
    }
}
