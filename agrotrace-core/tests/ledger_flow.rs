//! End-to-end ledger scenarios: custody handoffs, anchoring, pause gating,
//! and the supplemental registries, driven through the `TraceLedger` facade.

use agrotrace_core::{
    orgs, Address, BatchStatus, Clock, EventType, Hash32, LedgerConfig, RoleSet, Signal,
    TraceError, TraceLedger,
};

struct Actors {
    owner: Address,
    producer: Address,
    processor: Address,
    transporter: Address,
    retailer: Address,
    auditor: Address,
}

impl Actors {
    fn new() -> Self {
        Self {
            owner: Address::from_label("owner"),
            producer: Address::from_label("producer"),
            processor: Address::from_label("processor"),
            transporter: Address::from_label("transporter"),
            retailer: Address::from_label("retailer"),
            auditor: Address::from_label("auditor"),
        }
    }
}

fn ledger_with_roles() -> (TraceLedger, Actors) {
    let actors = Actors::new();
    let mut ledger =
        TraceLedger::with_components(actors.owner, LedgerConfig::default(), Clock::fixed(1_700_000_000));
    ledger
        .set_roles(actors.owner, actors.producer, RoleSet::PRODUCER)
        .unwrap();
    ledger
        .set_roles(actors.owner, actors.processor, RoleSet::PROCESSOR)
        .unwrap();
    ledger
        .set_roles(actors.owner, actors.transporter, RoleSet::TRANSPORTER)
        .unwrap();
    ledger
        .set_roles(actors.owner, actors.retailer, RoleSet::RETAILER)
        .unwrap();
    ledger
        .set_roles(actors.owner, actors.auditor, RoleSet::AUDITOR)
        .unwrap();
    (ledger, actors)
}

fn seeded_batch(ledger: &mut TraceLedger, actors: &Actors) -> u64 {
    let product = ledger
        .create_product(actors.producer, "Coffee", "ipfs://meta")
        .unwrap();
    ledger
        .create_batch(actors.producer, product, Hash32::digest(b"batch-meta"))
        .unwrap()
}

#[test]
fn ids_are_monotonic_from_one_across_namespaces() {
    let (mut ledger, actors) = ledger_with_roles();
    for i in 0..3u8 {
        let id = ledger
            .create_product(actors.producer, &format!("Product {i}"), "ipfs://m")
            .unwrap();
        assert_eq!(id, i as u64 + 1);
    }
    for i in 0..3u8 {
        let id = ledger
            .create_batch(actors.producer, 1, Hash32::digest(&[i]))
            .unwrap();
        assert_eq!(id, i as u64 + 1);
    }
    ledger.set_committer(actors.owner, actors.auditor).unwrap();
    for i in 0..3u8 {
        let id = ledger
            .commit_merkle_root(actors.auditor, Hash32::digest(&[0xA0, i]), 1, 10)
            .unwrap();
        assert_eq!(id, i as u64 + 1);
    }
}

#[test]
fn every_batch_starts_with_a_created_entry() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let events = ledger.get_batch_events(batch).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Created);
    assert_eq!(events[0].actor, actors.producer);
}

#[test]
fn full_handoff_scenario() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);

    ledger
        .record_trace_event(
            actors.producer,
            batch,
            EventType::Shipped,
            Hash32::digest(b"ship#1"),
            Some(actors.transporter),
        )
        .unwrap();
    assert_eq!(
        ledger.get_batch(batch).unwrap().pending_receiver,
        Some(actors.transporter)
    );

    ledger
        .record_trace_event(
            actors.transporter,
            batch,
            EventType::Received,
            Hash32::digest(b"recv#1"),
            None,
        )
        .unwrap();

    let after = ledger.get_batch(batch).unwrap();
    assert_eq!(after.current_owner, actors.transporter);
    assert_eq!(after.pending_receiver, None);
    assert!(!after.closed);
    assert_eq!(ledger.get_batch_events(batch).unwrap().len(), 3);
}

#[test]
fn only_the_pending_receiver_may_receive() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    ledger
        .record_trace_event(
            actors.producer,
            batch,
            EventType::Shipped,
            Hash32::digest(b"ship"),
            Some(actors.transporter),
        )
        .unwrap();

    let err = ledger
        .record_trace_event(
            actors.retailer,
            batch,
            EventType::Received,
            Hash32::digest(b"recv"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));

    // the rejected call wrote nothing
    assert_eq!(ledger.get_batch_events(batch).unwrap().len(), 2);
    assert_eq!(
        ledger.get_batch(batch).unwrap().pending_receiver,
        Some(actors.transporter)
    );
}

#[test]
fn received_without_shipment_fails() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let err = ledger
        .record_trace_event(
            actors.processor,
            batch,
            EventType::Received,
            Hash32::digest(b"recv"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));
}

#[test]
fn shipping_to_self_always_fails() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let err = ledger
        .record_trace_event(
            actors.producer,
            batch,
            EventType::Shipped,
            Hash32::digest(b"self"),
            Some(actors.producer),
        )
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));
}

#[test]
fn role_gate_rejects_retailer_shipping() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let err = ledger
        .record_trace_event(
            actors.retailer,
            batch,
            EventType::Shipped,
            Hash32::digest(b"ship"),
            Some(actors.processor),
        )
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));
}

#[test]
fn sold_closes_batch_under_default_policy() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    // hand custody to the retailer directly
    ledger
        .transfer_batch_owner(actors.producer, batch, actors.retailer)
        .unwrap();
    ledger
        .record_trace_event(
            actors.retailer,
            batch,
            EventType::Sold,
            Hash32::digest(b"sold"),
            None,
        )
        .unwrap();
    assert!(ledger.get_batch(batch).unwrap().closed);

    let err = ledger
        .record_trace_event(
            actors.producer,
            batch,
            EventType::Processed,
            Hash32::digest(b"late"),
            None,
        )
        .unwrap_err();
    assert_eq!(err, TraceError::BatchClosed(batch));
}

#[test]
fn sold_keeps_batch_open_when_policy_disabled() {
    let actors = Actors::new();
    let config = LedgerConfig {
        close_on_terminal: false,
        ..LedgerConfig::default()
    };
    let mut ledger = TraceLedger::with_components(actors.owner, config, Clock::fixed(1));
    ledger
        .set_roles(actors.owner, actors.producer, RoleSet::PRODUCER)
        .unwrap();
    ledger
        .set_roles(actors.owner, actors.retailer, RoleSet::RETAILER)
        .unwrap();
    let batch = seeded_batch(&mut ledger, &actors);
    ledger
        .record_trace_event(
            actors.retailer,
            batch,
            EventType::Sold,
            Hash32::digest(b"sold"),
            None,
        )
        .unwrap();
    assert!(!ledger.get_batch(batch).unwrap().closed);
}

#[test]
fn create_batch_requires_existing_product() {
    let (mut ledger, actors) = ledger_with_roles();
    let err = ledger
        .create_batch(actors.producer, 999, Hash32::digest(b"x"))
        .unwrap_err();
    assert_eq!(err, TraceError::InvalidProduct(999));
}

#[test]
fn non_producer_cannot_create() {
    let (mut ledger, actors) = ledger_with_roles();
    let err = ledger
        .create_product(actors.processor, "Milk", "ipfs://milk")
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));
}

#[test]
fn merkle_root_commit_scenario() {
    let (mut ledger, actors) = ledger_with_roles();
    let committer = Address::from_label("committer");
    ledger.add_committer(actors.owner, committer).unwrap();

    let r1 = Hash32::digest(b"merkle#001");
    let anchor = ledger.commit_merkle_root(committer, r1, 1, 10).unwrap();
    assert_eq!(anchor, 1);
    assert_eq!(ledger.total_anchors(), 1);
    let stored = ledger.get_anchor(anchor).unwrap();
    assert_eq!(stored.root, r1);
    assert_eq!((stored.from_event_id, stored.to_event_id), (1, 10));

    // same root, different range: still a duplicate
    let err = ledger.commit_merkle_root(committer, r1, 11, 20).unwrap_err();
    assert_eq!(err, TraceError::RootAlreadyCommitted);
    assert_eq!(ledger.total_anchors(), 1);
}

#[test]
fn non_committer_cannot_anchor() {
    let (mut ledger, actors) = ledger_with_roles();
    let err = ledger
        .commit_merkle_root(actors.auditor, Hash32::digest(b"r"), 1, 2)
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));
}

#[test]
fn commit_with_batch_code_is_atomic_and_rebindable() {
    let (mut ledger, actors) = ledger_with_roles();
    let committer = Address::from_label("committer");
    ledger.set_committer(actors.owner, committer).unwrap();

    let err = ledger
        .commit_with_batch_code(committer, Hash32::digest(b"seg-0"), 1, 5, "")
        .unwrap_err();
    assert!(matches!(err, TraceError::InvalidInput(_)));
    assert_eq!(ledger.total_anchors(), 0);

    let a1 = ledger
        .commit_with_batch_code(committer, Hash32::digest(b"seg-1"), 1, 10, "LOT-42")
        .unwrap();
    let a2 = ledger
        .commit_with_batch_code(committer, Hash32::digest(b"seg-2"), 11, 20, "LOT-42")
        .unwrap();
    assert_eq!(ledger.get_anchor_ids_by_code("LOT-42"), vec![a1, a2]);
}

#[test]
fn batch_code_binding_is_unique_and_owner_gated() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);

    let err = ledger
        .bind_batch_code(actors.retailer, batch, "BATCH-TEA-001")
        .unwrap_err();
    assert!(matches!(err, TraceError::Unauthorized(_)));

    ledger
        .bind_batch_code(actors.producer, batch, "BATCH-TEA-001")
        .unwrap();
    assert_eq!(ledger.get_batch_id_by_code("BATCH-TEA-001"), Some(batch));
    assert_eq!(
        ledger.get_batch_ids_by_batch_code("BATCH-TEA-001"),
        vec![batch]
    );

    // even the registry owner cannot rebind
    let err = ledger
        .bind_batch_code(actors.owner, batch, "BATCH-TEA-001")
        .unwrap_err();
    assert_eq!(err, TraceError::BatchCodeAlreadyUsed("BATCH-TEA-001".into()));
}

#[test]
fn pause_gates_every_component_but_not_reads() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let committer = Address::from_label("committer");
    ledger.add_committer(actors.owner, committer).unwrap();

    ledger.pause(actors.owner).unwrap();
    assert!(ledger.paused());

    assert_eq!(
        ledger
            .create_product(actors.producer, "Tea", "ipfs://t")
            .unwrap_err(),
        TraceError::ContractPaused
    );
    assert_eq!(
        ledger
            .create_batch(actors.producer, 1, Hash32::digest(b"b"))
            .unwrap_err(),
        TraceError::ContractPaused
    );
    assert_eq!(
        ledger
            .record_trace_event(
                actors.producer,
                batch,
                EventType::Processed,
                Hash32::digest(b"p"),
                None
            )
            .unwrap_err(),
        TraceError::ContractPaused
    );
    assert_eq!(
        ledger
            .commit_merkle_root(committer, Hash32::digest(b"r"), 1, 2)
            .unwrap_err(),
        TraceError::ContractPaused
    );
    assert_eq!(
        ledger
            .bind_batch_code(actors.producer, batch, "CODE")
            .unwrap_err(),
        TraceError::ContractPaused
    );
    assert_eq!(
        ledger
            .register_organization(actors.owner, Address::from_label("farm"), 1, "Farm", "cid", true)
            .unwrap_err(),
        TraceError::ContractPaused
    );

    // read-only lookups stay available
    assert!(ledger.get_batch(batch).is_ok());
    assert!(ledger.get_batch_events(batch).is_ok());
    assert!(ledger.get_product(1).is_ok());

    // non-owner cannot pause or unpause
    assert!(matches!(
        ledger.pause(actors.producer).unwrap_err(),
        TraceError::Unauthorized(_)
    ));

    ledger.unpause(actors.owner).unwrap();
    assert!(ledger
        .create_product(actors.producer, "Tea", "ipfs://t")
        .is_ok());
}

#[test]
fn status_updates_are_monotonic() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    ledger
        .update_batch_status(actors.producer, batch, BatchStatus::Processing)
        .unwrap();
    ledger
        .update_batch_status(actors.producer, batch, BatchStatus::Processing)
        .unwrap();
    let err = ledger
        .update_batch_status(actors.producer, batch, BatchStatus::Created)
        .unwrap_err();
    assert_eq!(
        err,
        TraceError::InvalidStateBackward {
            current: 1,
            requested: 0
        }
    );
}

#[test]
fn split_creates_children_and_consumes_parent() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);

    let err = ledger
        .split_batch(actors.producer, batch, 0, Hash32::digest(b"s"))
        .unwrap_err();
    assert_eq!(err, TraceError::BadCount(0));
    let err = ledger
        .split_batch(actors.producer, batch, 17, Hash32::digest(b"s"))
        .unwrap_err();
    assert_eq!(err, TraceError::BadCount(17));

    let children = ledger
        .split_batch(actors.producer, batch, 3, Hash32::digest(b"split"))
        .unwrap();
    assert_eq!(children, vec![2, 3, 4]);

    let parent = ledger.get_batch(batch).unwrap();
    assert!(parent.closed);
    assert_eq!(parent.children, children);
    for &child in &children {
        let row = ledger.get_batch(child).unwrap();
        assert_eq!(row.parents, vec![batch]);
        assert_eq!(row.current_owner, actors.producer);
        assert_eq!(
            ledger.get_batch_events(child).unwrap()[0].event_type,
            EventType::Created
        );
    }
}

#[test]
fn merge_requires_two_owned_open_sources() {
    let (mut ledger, actors) = ledger_with_roles();
    let product = ledger
        .create_product(actors.producer, "Apple", "ipfs://a")
        .unwrap();
    let b1 = ledger
        .create_batch(actors.producer, product, Hash32::digest(b"b1"))
        .unwrap();
    let b2 = ledger
        .create_batch(actors.producer, product, Hash32::digest(b"b2"))
        .unwrap();

    let err = ledger
        .merge_batches(actors.producer, &[b1], product, Hash32::digest(b"m"))
        .unwrap_err();
    assert_eq!(err, TraceError::BadSources(1));
    let err = ledger
        .merge_batches(actors.producer, &[b1, b1], product, Hash32::digest(b"m"))
        .unwrap_err();
    assert_eq!(err, TraceError::BadSources(2));

    let merged = ledger
        .merge_batches(actors.producer, &[b1, b2], product, Hash32::digest(b"m"))
        .unwrap();
    assert_eq!(merged, 3);
    let child = ledger.get_batch(merged).unwrap();
    assert_eq!(child.parents, vec![b1, b2]);
    assert!(ledger.get_batch(b1).unwrap().closed);
    assert!(ledger.get_batch(b2).unwrap().closed);

    // consumed sources cannot be merged again
    let err = ledger
        .merge_batches(actors.producer, &[b1, b2], product, Hash32::digest(b"m2"))
        .unwrap_err();
    assert_eq!(err, TraceError::BatchClosed(b1));
}

#[test]
fn transfer_rejects_inactive_target_org() {
    let (mut ledger, actors) = ledger_with_roles();
    let batch = seeded_batch(&mut ledger, &actors);
    let target = Address::from_label("proc-wallet");
    let org = ledger
        .register_organization(actors.owner, target, orgs::ORG_TYPE_PROCESSOR, "Proc", "cid", true)
        .unwrap();
    ledger
        .update_organization(actors.owner, org, target, orgs::ORG_TYPE_PROCESSOR, "Proc", "cid", false)
        .unwrap();

    let err = ledger
        .transfer_batch_owner(actors.producer, batch, target)
        .unwrap_err();
    assert_eq!(err, TraceError::TargetInactive(org));
}

#[test]
fn fee_gate_collects_and_withdraws() {
    let actors = Actors::new();
    let config = LedgerConfig {
        create_batch_fee: 1_000,
        ..LedgerConfig::default()
    };
    let mut ledger = TraceLedger::with_components(actors.owner, config, Clock::fixed(1));
    ledger
        .set_roles(actors.owner, actors.producer, RoleSet::PRODUCER)
        .unwrap();
    let product = ledger
        .create_product(actors.producer, "Mango", "ipfs://m")
        .unwrap();

    let err = ledger
        .create_batch_paid(actors.producer, product, Hash32::digest(b"b"), 999)
        .unwrap_err();
    assert_eq!(
        err,
        TraceError::InsufficientFee {
            required: 1_000,
            paid: 999
        }
    );
    // nothing was allocated by the rejected call
    assert_eq!(ledger.get_batch(1).unwrap_err(), TraceError::BatchNotFound(1));

    ledger
        .create_batch_paid(actors.producer, product, Hash32::digest(b"b"), 1_000)
        .unwrap();
    ledger
        .create_batch_paid(actors.producer, product, Hash32::digest(b"c"), 1_000)
        .unwrap();
    assert_eq!(ledger.total_fee_collected(), 2_000);
    assert_eq!(ledger.user_fees(actors.producer), 2_000);

    ledger
        .withdraw_fees(actors.owner, actors.owner, 2_000)
        .unwrap();
    assert_eq!(ledger.fee_balance(), 0);

    ledger.set_create_batch_fee(actors.owner, 5_000).unwrap();
    assert_eq!(ledger.fee_create_batch(), 5_000);
}

#[test]
fn cert_lifecycle_with_org_authorization() {
    let (mut ledger, actors) = ledger_with_roles();
    let auditor_wallet = Address::from_label("auditor-org");
    let farmer_wallet = Address::from_label("farmer-org");
    ledger
        .register_organization(actors.owner, auditor_wallet, orgs::ORG_TYPE_AUDITOR, "AuditorOrg", "cid-a", true)
        .unwrap();
    ledger
        .register_organization(actors.owner, farmer_wallet, orgs::ORG_TYPE_FARM, "FarmOrg", "cid-f", true)
        .unwrap();

    let subject = Hash32::digest(b"Batch-001");
    let cert = ledger
        .issue_cert(auditor_wallet, subject, "cid-cert", 9_999_999_999)
        .unwrap();
    assert!(ledger.get_cert(cert).unwrap().active);

    let err = ledger
        .issue_cert(farmer_wallet, subject, "cid", 1)
        .unwrap_err();
    assert_eq!(err, TraceError::NotAuthorizedAsAuditor);

    // a second auditor org cannot revoke the first's certificate
    let other_auditor = Address::from_label("auditor-b");
    ledger
        .register_organization(actors.owner, other_auditor, orgs::ORG_TYPE_AUDITOR, "AuditorB", "cid-b", true)
        .unwrap();
    let err = ledger.revoke_cert(other_auditor, cert).unwrap_err();
    assert_eq!(err, TraceError::NotAuthorizedToRevoke(cert));

    ledger.revoke_cert(auditor_wallet, cert).unwrap();
    assert!(!ledger.get_cert(cert).unwrap().active);
}

#[test]
fn telemetry_requires_active_org() {
    let (mut ledger, actors) = ledger_with_roles();
    let farm = Address::from_label("farm-wallet");
    let org = ledger
        .register_organization(actors.owner, farm, orgs::ORG_TYPE_FARM, "FarmA", "cid", true)
        .unwrap();

    let id = ledger
        .anchor_telemetry(farm, Hash32::digest(b"temp:25C"), 1, 101, 100, 3_700, "ipfs://t")
        .unwrap();
    assert_eq!(ledger.get_telemetry(id).unwrap().actor_org_id, org);
    assert_eq!(ledger.telemetry_by_ref(1, 101).len(), 1);

    ledger
        .update_organization(actors.owner, org, farm, orgs::ORG_TYPE_FARM, "FarmA", "cid", false)
        .unwrap();
    let err = ledger
        .anchor_telemetry(farm, Hash32::digest(b"d"), 1, 101, 1, 2, "cid")
        .unwrap_err();
    assert_eq!(err, TraceError::OrgInactive(org));
}

#[test]
fn signals_follow_mutations() {
    let (mut ledger, actors) = ledger_with_roles();
    ledger.drain_signals();

    let batch = seeded_batch(&mut ledger, &actors);
    let signals = ledger.drain_signals();
    assert!(signals
        .iter()
        .any(|s| matches!(s, Signal::ProductCreated { id: 1, .. })));
    assert!(signals
        .iter()
        .any(|s| matches!(s, Signal::BatchCreated { id, .. } if *id == batch)));

    // a failed call leaves no signal behind
    let _ = ledger.create_batch(actors.retailer, 1, Hash32::digest(b"x"));
    assert!(ledger.signals().is_empty());
}
