//! itemseal: signed-item authentication core
//!
//! Key management, item signing, verification with tamper feedback, local
//! persistence of the last known signature, and authority-gated propagation
//! of signatures to every peer in a session.

pub mod channel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod propagator;
pub mod record;
pub mod signer;
pub mod store;
pub mod verifier;

pub use channel::{LocalBus, SignatureChannel};
pub use config::{NodeConfig, Role};
pub use error::{SealError, SealResult};
pub use keys::{KeyAlgorithm, KeyPair, PublicKey, SecretKey};
pub use propagator::{AuthorityToken, ItemState, ReceiveOutcome, SignaturePropagator};
pub use record::{BroadcastMessage, SignatureRecord};
pub use signer::ItemSigner;
pub use store::SignatureStore;
pub use verifier::{SignatureVerifier, VerificationResult, VerifyDetail};
