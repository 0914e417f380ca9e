//! Error taxonomy for key, persistence, authority and transport failures.
//!
//! "Not yet signed" and "invalid signature" are verification results, not
//! errors, and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SealError {
    /// Key material could not be generated, parsed or loaded.
    #[error("key error: {0}")]
    Key(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A node without signing authority attempted to sign.
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 or hex payload could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("channel error: {0}")]
    Channel(String),

    /// The authority cannot issue a version above the one it already holds.
    #[error("version counter exhausted at {0}")]
    VersionExhausted(u64),

    #[error("config error: {0}")]
    Config(String),
}

pub type SealResult<T> = std::result::Result<T, SealError>;
