//! Authority-gated signing workflow and signature propagation.
//!
//! Each node owns one propagator per item. The authority signs, saves and
//! broadcasts; every other node applies received records and verifies them
//! against the authority's public key. Verification outcome is tracked per
//! node; there is no global consensus state.

use crate::channel::SignatureChannel;
use crate::config::{NodeConfig, Role};
use crate::error::{SealError, SealResult};
use crate::keys::{KeyPair, PublicKey};
use crate::record::{BroadcastMessage, SignatureRecord};
use crate::signer::ItemSigner;
use crate::store::SignatureStore;
use crate::verifier::{SignatureVerifier, VerificationResult};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Per-observer lifecycle of an item's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Unsigned,
    Signed,
    Verified { valid: bool },
}

/// Capability to sign on a specific node. Only minted by
/// [`SignaturePropagator::authority_token`].
#[derive(Debug)]
pub struct AuthorityToken {
    node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The record replaced the current one. `authenticated` tells whether it
    /// verified against the authority key without the item data.
    Applied { authenticated: bool },
    /// The message is older than the authenticated record already held.
    Stale { current: u64, received: u64 },
    /// The message is for another item.
    Ignored,
    Rejected(String),
}

pub struct SignaturePropagator {
    node_id: String,
    item_id: String,
    role: Role,
    keypair: Option<KeyPair>,
    public_key: PublicKey,
    store: SignatureStore,
    channel: Arc<dyn SignatureChannel>,
    signer: ItemSigner,
    verifier: SignatureVerifier,
    /// Single-writer section; holds the last version issued by this process.
    writer: Mutex<u64>,
    current: RwLock<Option<SignatureRecord>>,
    state: RwLock<ItemState>,
}

impl SignaturePropagator {
    /// Build a node for `item_id`, restoring the last known record from `store`.
    pub fn new(
        node_id: impl Into<String>,
        item_id: impl Into<String>,
        role: Role,
        public_key: PublicKey,
        store: SignatureStore,
        channel: Arc<dyn SignatureChannel>,
    ) -> Self {
        let current = store.load();
        let state = if current.as_ref().is_some_and(SignatureRecord::is_signed) {
            ItemState::Signed
        } else {
            ItemState::Unsigned
        };

        Self {
            node_id: node_id.into(),
            item_id: item_id.into(),
            role,
            keypair: None,
            public_key,
            store,
            channel,
            signer: ItemSigner::new(),
            verifier: SignatureVerifier::new(),
            writer: Mutex::new(0),
            current: RwLock::new(current),
            state: RwLock::new(state),
        }
    }

    /// Give this node its private key. Only meaningful for the authority.
    pub fn with_keypair(mut self, keypair: KeyPair) -> Self {
        self.keypair = Some(keypair);
        self
    }

    /// Wire up a node from configuration.
    ///
    /// The authority loads or generates its key under `key_file` (default
    /// `<data_dir>/<node_id>.key`). Peers need the authority's public key.
    pub fn from_config(config: &NodeConfig, channel: Arc<dyn SignatureChannel>) -> SealResult<Self> {
        config.validate()?;
        let store = SignatureStore::new(config.signature_path());

        let configured_public = config
            .public_key
            .as_deref()
            .map(PublicKey::from_encoded)
            .transpose()?
            .map(|(_, key)| key);

        match config.role {
            Role::Authority => {
                let key_file = config
                    .key_file
                    .clone()
                    .unwrap_or_else(|| config.data_dir.join(format!("{}.key", config.node_id)));
                let keypair = KeyPair::load_or_generate(&key_file, &config.node_id, config.algorithm)?;
                let public_key = configured_public.unwrap_or_else(|| keypair.public.clone());
                Ok(Self::new(
                    &config.node_id,
                    &config.item_id,
                    Role::Authority,
                    public_key,
                    store,
                    channel,
                )
                .with_keypair(keypair))
            }
            Role::Peer => {
                let public_key = configured_public.ok_or_else(|| {
                    SealError::Config("peer nodes need the authority public_key".to_string())
                })?;
                Ok(Self::new(
                    &config.node_id,
                    &config.item_id,
                    Role::Peer,
                    public_key,
                    store,
                    channel,
                ))
            }
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The signing capability, if this node is the authority and holds a key.
    pub fn authority_token(&self) -> Option<AuthorityToken> {
        (self.role == Role::Authority && self.keypair.is_some()).then(|| AuthorityToken {
            node_id: self.node_id.clone(),
        })
    }

    /// Sign `item_data`, keep it as the current record, save it and
    /// broadcast it once.
    ///
    /// Save and broadcast failures are logged; the record stays current
    /// locally either way.
    pub fn sign(
        &self,
        token: &AuthorityToken,
        item_data: &[u8],
        signed_by: &str,
    ) -> SealResult<SignatureRecord> {
        if token.node_id != self.node_id || self.role != Role::Authority {
            return Err(SealError::Permission(format!(
                "token for '{}' cannot sign on '{}'",
                token.node_id, self.node_id
            )));
        }
        let keypair = self.keypair.as_ref().ok_or_else(|| {
            SealError::Permission(format!("node '{}' holds no private key", self.node_id))
        })?;

        let mut last_version = self.writer.lock();
        let mut current = self.current.write();
        let held = current
            .as_ref()
            .filter(|r| self.verifier.authenticate(r, &self.public_key))
            .map_or(0, |r| r.version);
        let version = next_version((*last_version).max(held))?;

        let record = self.signer.sign(item_data, signed_by, keypair, version);
        *current = Some(record.clone());
        *self.state.write() = ItemState::Signed;
        drop(current);
        *last_version = version;

        info!(
            node_id = %self.node_id,
            item_id = %self.item_id,
            signed_by,
            version,
            signature = %record.signature_b64(),
            "item signed"
        );

        if let Err(e) = self.store.save(&record) {
            warn!(item_id = %self.item_id, error = %e, "failed to persist signature");
        }

        match self.channel.broadcast(&self.node_id, &record.to_message(&self.item_id)) {
            Ok(()) => debug!(item_id = %self.item_id, version, "broadcast signed item to all peers"),
            Err(e) => warn!(item_id = %self.item_id, error = %e, "broadcast failed"),
        }

        Ok(record)
    }

    /// Sign using this node's own authority, failing with `Permission` if it has none.
    pub fn sign_as(&self, item_data: &[u8], signed_by: &str) -> SealResult<SignatureRecord> {
        let token = self.authority_token().ok_or_else(|| {
            SealError::Permission(format!("node '{}' is not the signing authority", self.node_id))
        })?;
        self.sign(&token, item_data, signed_by)
    }

    /// Apply a broadcast record, last writer wins.
    ///
    /// Versions only order records that authenticate against the authority
    /// key: an authenticated record older than an authenticated current one
    /// is dropped. Records that do not authenticate are still applied, so
    /// they show up as invalid on verify, but never block a later record.
    pub fn receive(&self, msg: &BroadcastMessage) -> ReceiveOutcome {
        if msg.item_id != self.item_id {
            return ReceiveOutcome::Ignored;
        }

        let record = match msg.to_record() {
            Ok(record) => record,
            Err(e) => {
                warn!(item_id = %self.item_id, error = %e, "rejected broadcast");
                return ReceiveOutcome::Rejected(e.to_string());
            }
        };

        let authenticated = self.verifier.authenticate(&record, &self.public_key);

        let _writer = self.writer.lock();
        let mut current = self.current.write();
        if authenticated {
            let held = current
                .as_ref()
                .filter(|held| self.verifier.authenticate(held, &self.public_key));
            if let Some(held) = held.filter(|held| record.version < held.version) {
                debug!(
                    item_id = %self.item_id,
                    current = held.version,
                    received = record.version,
                    "dropping stale broadcast"
                );
                return ReceiveOutcome::Stale {
                    current: held.version,
                    received: record.version,
                };
            }
        } else {
            warn!(
                item_id = %self.item_id,
                signed_by = %record.signed_by,
                "broadcast does not authenticate against the authority key"
            );
        }
        *current = Some(record.clone());
        *self.state.write() = ItemState::Signed;
        drop(current);

        info!(
            node_id = %self.node_id,
            item_id = %self.item_id,
            signed_by = %record.signed_by,
            version = record.version,
            authenticated,
            "received signature"
        );

        if let Err(e) = self.store.save(&record) {
            warn!(item_id = %self.item_id, error = %e, "failed to persist received signature");
        }
        ReceiveOutcome::Applied { authenticated }
    }

    /// Verify `item_data` against the locally held record.
    pub fn verify(&self, item_data: &[u8]) -> VerificationResult {
        // state is written under the same read guard so it always describes
        // the record that was checked
        let current = self.current.read();
        let result = self.verifier.verify(item_data, current.as_ref(), &self.public_key);
        if result.signer_identity.is_some() {
            *self.state.write() = ItemState::Verified {
                valid: result.is_valid,
            };
        }
        drop(current);

        if result.is_valid {
            info!(node_id = %self.node_id, item_id = %self.item_id, "{result}");
        } else {
            warn!(node_id = %self.node_id, item_id = %self.item_id, "{result}");
        }
        result
    }

    pub fn verify_item(&self, item_data: &[u8]) -> bool {
        self.verify(item_data).is_valid
    }

    pub fn state(&self) -> ItemState {
        *self.state.read()
    }

    pub fn current(&self) -> Option<SignatureRecord> {
        self.current.read().clone()
    }

    /// Base64 signature of the current record.
    pub fn signature(&self) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .filter(|r| r.is_signed())
            .map(SignatureRecord::signature_b64)
    }

    pub fn signed_by(&self) -> Option<String> {
        self.current.read().as_ref().map(|r| r.signed_by.clone())
    }
}

/// Next version after `last`: strictly greater, and never behind the wall
/// clock in microseconds so a restarted authority outranks what it issued
/// before, even when its signature file is gone.
fn next_version(last: u64) -> SealResult<u64> {
    let floor = last
        .checked_add(1)
        .ok_or(SealError::VersionExhausted(last))?;
    Ok(floor.max(now_micros()))
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
}
