//! Cross-node signing, propagation and verification over an in-process bus.

use itemseal::{
    store, ItemSigner, ItemState, KeyPair, LocalBus, ReceiveOutcome, Role, SignaturePropagator,
    SignatureStore, SignatureVerifier,
};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

const ITEM: &[u8] = b"ItemData";
const APPLIED: ReceiveOutcome = ReceiveOutcome::Applied {
    authenticated: true,
};

struct Peer {
    node: SignaturePropagator,
    inbox: Receiver<itemseal::BroadcastMessage>,
}

impl Peer {
    fn pump(&self) -> Vec<ReceiveOutcome> {
        self.inbox.try_iter().map(|msg| self.node.receive(&msg)).collect()
    }
}

fn host(dir: &Path, bus: &Arc<LocalBus>, keypair: KeyPair) -> SignaturePropagator {
    SignaturePropagator::new(
        "host",
        "item",
        Role::Authority,
        keypair.public.clone(),
        SignatureStore::new(dir.join("host").join("item.signature.json")),
        bus.clone(),
    )
    .with_keypair(keypair)
}

fn peer(dir: &Path, bus: &Arc<LocalBus>, name: &str, public: &KeyPair) -> Peer {
    let inbox = bus.subscribe(name);
    let node = SignaturePropagator::new(
        name,
        "item",
        Role::Peer,
        public.public.clone(),
        SignatureStore::new(dir.join(name).join("item.signature.json")),
        bus.clone(),
    );
    Peer { node, inbox }
}

#[test]
fn alice_signs_and_verifies() {
    let keypair = KeyPair::generate("host");
    let record = ItemSigner::new().sign(ITEM, "Alice", &keypair, 1);
    assert_eq!(record.signed_by, "Alice");

    let verifier = SignatureVerifier::new();
    let result = verifier.verify(ITEM, Some(&record), &keypair.public);
    assert!(result.is_valid);
    assert_eq!(result.signer_identity.as_deref(), Some("Alice"));

    let tampered = verifier.verify(b"TamperedData", Some(&record), &keypair.public);
    assert!(!tampered.is_valid);
}

#[test]
fn signature_for_other_content_never_validates() {
    let keypair = KeyPair::generate("host");
    let verifier = SignatureVerifier::new();
    let signer = ItemSigner::new();

    let inputs: [&[u8]; 4] = [b"", b"a", b"ItemData", b"ItemData "];
    for a in inputs {
        let record = signer.sign(a, "Alice", &keypair, 1);
        for b in inputs {
            let result = verifier.verify(b, Some(&record), &keypair.public);
            assert_eq!(result.is_valid, a == b, "signed {a:?}, verified {b:?}");
        }
    }
}

#[test]
fn peer_matches_authority_after_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = host(dir.path(), &bus, keypair);

    let record = a.sign_as(ITEM, "Alice").unwrap();
    assert_eq!(b.pump(), vec![APPLIED]);

    assert_eq!(b.node.state(), ItemState::Signed);
    assert_eq!(
        store::load(&dir.path().join("node-b").join("item.signature.json")),
        Some(record.clone())
    );
    assert_eq!(b.node.current(), Some(record));

    assert_eq!(a.verify(ITEM), b.node.verify(ITEM));
    assert_eq!(a.verify(b"TamperedData"), b.node.verify(b"TamperedData"));
    assert_eq!(b.node.signed_by().as_deref(), Some("Alice"));
    assert_eq!(b.node.signature(), a.signature());
}

#[test]
fn sequential_signs_leave_last_record() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = host(dir.path(), &bus, keypair);

    let r1 = a.sign_as(ITEM, "Alice").unwrap();
    let r2 = a.sign_as(ITEM, "Bob").unwrap();
    assert_ne!(r1, r2);
    assert!(r2.version > r1.version);

    assert_eq!(b.pump(), vec![APPLIED, APPLIED]);
    assert_eq!(b.node.current(), Some(r2.clone()));
    assert_eq!(a.current(), Some(r2));
    assert!(b.node.verify_item(ITEM));
    assert_eq!(b.node.signed_by().as_deref(), Some("Bob"));
}

#[test]
fn out_of_order_delivery_drops_stale_record() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = host(dir.path(), &bus, keypair);

    let r1 = a.sign_as(ITEM, "Alice").unwrap();
    let r2 = a.sign_as(ITEM, "Bob").unwrap();
    let mut inbox: Vec<_> = b.inbox.try_iter().collect();
    inbox.reverse();

    assert_eq!(b.node.receive(&inbox[0]), APPLIED);
    assert_eq!(
        b.node.receive(&inbox[1]),
        ReceiveOutcome::Stale {
            current: r2.version,
            received: r1.version
        }
    );
    assert_eq!(b.node.current(), Some(r2));
}

#[test]
fn peer_with_wrong_public_key_reports_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let impostor = KeyPair::generate("impostor");
    let b = peer(dir.path(), &bus, "node-b", &impostor);
    let a = host(dir.path(), &bus, KeyPair::generate("host"));

    a.sign_as(ITEM, "Alice").unwrap();
    b.pump();

    let result = b.node.verify(ITEM);
    assert!(!result.is_valid);
    assert_eq!(result.signer_identity.as_deref(), Some("Alice"));
    assert_eq!(b.node.state(), ItemState::Verified { valid: false });
}

#[test]
fn peer_sign_is_permission_error_and_nothing_is_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let c = peer(dir.path(), &bus, "node-c", &keypair);

    let err = b.node.sign_as(ITEM, "Mallory").unwrap_err();
    assert!(matches!(err, itemseal::SealError::Permission(_)));
    assert!(c.pump().is_empty());
}

#[test]
fn concurrent_verifiers_agree() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let a = Arc::new(host(dir.path(), &bus, KeyPair::generate("host")));
    a.sign_as(ITEM, "Alice").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let a = Arc::clone(&a);
            std::thread::spawn(move || {
                if i % 2 == 0 {
                    a.verify_item(ITEM)
                } else {
                    !a.verify_item(b"TamperedData")
                }
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(a.current().unwrap().signed_by, "Alice");
}

#[test]
fn concurrent_signs_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = Arc::new(host(dir.path(), &bus, keypair));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let a = Arc::clone(&a);
            std::thread::spawn(move || a.sign_as(ITEM, &format!("player-{i}")).unwrap())
        })
        .collect();
    let mut versions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap().version).collect();
    versions.sort_unstable();
    versions.dedup();
    assert_eq!(versions.len(), 4);

    // broadcasts left the critical section in version order
    let outcomes = b.pump();
    assert_eq!(outcomes, vec![APPLIED; 4]);
    assert_eq!(b.node.current(), a.current());
    assert_eq!(b.node.current().unwrap().version, versions[3]);
}

#[test]
fn unauthenticated_broadcast_cannot_block_authority() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = host(dir.path(), &bus, keypair);

    let forged = itemseal::BroadcastMessage {
        item_id: "item".into(),
        signature: "AAAA".into(),
        signed_by: "Mallory".into(),
        item_data_hash: String::new(),
        version: u64::MAX,
    };
    assert_eq!(
        b.node.receive(&forged),
        ReceiveOutcome::Applied {
            authenticated: false
        }
    );
    assert!(!b.node.verify_item(ITEM));

    let record = a.sign_as(ITEM, "Alice").unwrap();
    assert_eq!(b.pump(), vec![APPLIED]);
    assert_eq!(b.node.current(), Some(record));
    assert_eq!(b.node.signed_by().as_deref(), Some("Alice"));
    assert!(b.node.verify_item(ITEM));
}

#[test]
fn rewritten_version_does_not_authenticate() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let b = peer(dir.path(), &bus, "node-b", &keypair);
    let a = host(dir.path(), &bus, keypair);

    a.sign_as(ITEM, "Alice").unwrap();
    let mut replayed = b.inbox.try_recv().unwrap();
    replayed.version = u64::MAX;
    assert_eq!(
        b.node.receive(&replayed),
        ReceiveOutcome::Applied {
            authenticated: false
        }
    );

    a.sign_as(ITEM, "Bob").unwrap();
    assert_eq!(b.pump(), vec![APPLIED]);
    assert_eq!(b.node.signed_by().as_deref(), Some("Bob"));
}

#[test]
fn authority_restart_without_signature_file_still_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(LocalBus::new());
    let keypair = KeyPair::generate("host");
    let encoded = keypair.encoded_secret();
    let b = peer(dir.path(), &bus, "node-b", &keypair);

    let a = host(dir.path(), &bus, keypair);
    a.sign_as(ITEM, "Alice").unwrap();
    a.sign_as(ITEM, "Bob").unwrap();
    drop(a);
    std::fs::remove_dir_all(dir.path().join("host")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));

    let restarted = host(
        dir.path(),
        &bus,
        KeyPair::from_encoded_secret(&encoded).unwrap(),
    );
    assert_eq!(restarted.state(), ItemState::Unsigned);
    let carol = restarted.sign_as(ITEM, "Carol").unwrap();

    assert_eq!(b.pump(), vec![APPLIED; 3]);
    assert_eq!(b.node.current(), Some(carol.clone()));
    assert_eq!(restarted.current(), Some(carol));
    assert_eq!(b.node.verify(ITEM), restarted.verify(ITEM));
}
