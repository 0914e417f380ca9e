//! Transport seam for signature broadcasts.
//!
//! The real transport (session RPC, relay, etc.) lives outside this crate and
//! implements [`SignatureChannel`]. [`LocalBus`] is an in-process fan-out with
//! the same reliable, ordered semantics.

use crate::error::{SealError, SealResult};
use crate::record::BroadcastMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

/// One-way notification channel from a node to all of its peers.
pub trait SignatureChannel: Send + Sync {
    /// Deliver `msg` to every peer except `from`. Retries are the
    /// transport's business; callers make a single attempt.
    fn broadcast(&self, from: &str, msg: &BroadcastMessage) -> SealResult<()>;
}

struct Subscriber {
    node_id: String,
    tx: Sender<BroadcastMessage>,
}

#[derive(Default)]
pub struct LocalBus {
    subscribers: Mutex<Vec<Subscriber>>,
    closed: AtomicBool,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node_id` and return the receiving end of its inbox.
    pub fn subscribe(&self, node_id: impl Into<String>) -> Receiver<BroadcastMessage> {
        let (tx, rx) = mpsc::channel();
        let node_id = node_id.into();
        debug!(%node_id, "peer subscribed");
        self.subscribers.lock().push(Subscriber { node_id, tx });
        rx
    }

    pub fn peer_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Stop accepting broadcasts.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl SignatureChannel for LocalBus {
    fn broadcast(&self, from: &str, msg: &BroadcastMessage) -> SealResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SealError::Channel("bus closed".to_string()));
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if sub.node_id == from {
                return true;
            }
            match sub.tx.send(msg.clone()) {
                Ok(()) => {
                    trace!(to = %sub.node_id, item_id = %msg.item_id, "delivered");
                    true
                }
                Err(_) => {
                    debug!(node_id = %sub.node_id, "dropping disconnected peer");
                    false
                }
            }
        });
        Ok(())
    }
}
