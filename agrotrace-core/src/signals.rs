//! Typed signal log.
//!
//! Every successful mutation pushes one signal, mirroring the event surface
//! external indexers consume. The log is drainable; nothing in the ledger
//! reads it back.

use serde::{Deserialize, Serialize};

use crate::access::RoleSet;
use crate::custody::BatchStatus;
use crate::journal::EventType;
use crate::types::{
    Address, AnchorId, BatchId, CertId, Hash32, OrgId, ProductId, TelemetryId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Signal {
    RolesChanged {
        addr: Address,
        roles: RoleSet,
    },
    PauseChanged {
        paused: bool,
    },
    CommitterAdded {
        addr: Address,
    },
    CommitterRemoved {
        addr: Address,
    },
    CommitterSet {
        addr: Address,
    },
    ProductCreated {
        id: ProductId,
        name: String,
    },
    BatchCreated {
        id: BatchId,
        product_id: ProductId,
        creator: Address,
    },
    TraceEventRecorded {
        batch_id: BatchId,
        event_type: EventType,
        actor: Address,
    },
    BatchOwnerTransferred {
        batch_id: BatchId,
        from: Address,
        to: Address,
    },
    BatchStatusUpdated {
        batch_id: BatchId,
        status: BatchStatus,
    },
    BatchSplit {
        parent: BatchId,
        children: Vec<BatchId>,
    },
    BatchesMerged {
        sources: Vec<BatchId>,
        child: BatchId,
    },
    BatchCodeBound {
        batch_id: BatchId,
        code_hash: Hash32,
        code: String,
    },
    AnchorCodeBound {
        anchor_id: AnchorId,
        code_hash: Hash32,
        code: String,
    },
    RootCommitted {
        anchor_id: AnchorId,
        root: Hash32,
        from_event_id: u64,
        to_event_id: u64,
        committer: Address,
    },
    OrganizationRegistered {
        id: OrgId,
        wallet: Address,
    },
    OrganizationUpdated {
        id: OrgId,
    },
    CertIssued {
        id: CertId,
        issuer_org_id: OrgId,
    },
    CertRevoked {
        id: CertId,
    },
    TelemetryAnchored {
        id: TelemetryId,
        ref_type: u8,
        ref_id: u64,
    },
    FeePaid {
        payer: Address,
        amount: u128,
    },
    FeeUpdated {
        amount: u128,
    },
    FeesWithdrawn {
        to: Address,
        amount: u128,
    },
}

/// Append-only signal buffer.
#[derive(Clone, Debug, Default)]
pub struct SignalLog {
    entries: Vec<Signal>,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signal: Signal) {
        self.entries.push(signal);
    }

    pub fn last(&self) -> Option<&Signal> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[Signal] {
        &self.entries
    }

    /// Hands the buffered signals to the caller and clears the log.
    pub fn drain(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_log() {
        let mut log = SignalLog::new();
        log.push(Signal::PauseChanged { paused: true });
        log.push(Signal::PauseChanged { paused: false });
        assert_eq!(log.entries().len(), 2);
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.entries().is_empty());
        assert!(log.last().is_none());
    }

    #[test]
    fn signals_serialize_with_kind_tag() {
        let signal = Signal::BatchCreated {
            id: 1,
            product_id: 2,
            creator: Address::from_label("p"),
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"], "BatchCreated");
        assert_eq!(json["id"], 1);
    }
}
