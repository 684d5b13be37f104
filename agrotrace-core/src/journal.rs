//! Append-only event journal.
//!
//! Per-batch ordered log of recorded trace events. Index 0 for every batch is
//! the synthetic `Created` entry written atomically with batch creation.
//! Entries are immutable once appended; no edit or delete path exists.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::access::RoleSet;
use crate::error::{TraceError, TraceResult};
use crate::types::{Address, BatchId, Hash32, Timestamp};

/// Trace event type, in the wire ordinal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Created,
    Processed,
    Shipped,
    Received,
    Stored,
    Sold,
    Recalled,
    Custom,
}

impl EventType {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Sold and Recalled end a batch's custody life under the default policy.
    pub const fn is_terminal(self) -> bool {
        matches!(self, EventType::Sold | EventType::Recalled)
    }

    /// Role bits allowed to record this event type.
    ///
    /// `None` means the type is not role-gated: `Created` is internal-only
    /// and `Received` is address-bound to the pending receiver.
    pub const fn required_roles(self) -> Option<RoleSet> {
        match self {
            EventType::Created | EventType::Received => None,
            EventType::Processed => Some(RoleSet(RoleSet::PRODUCER.0 | RoleSet::PROCESSOR.0)),
            EventType::Shipped => Some(RoleSet(
                RoleSet::PRODUCER.0 | RoleSet::PROCESSOR.0 | RoleSet::TRANSPORTER.0,
            )),
            EventType::Stored => Some(RoleSet(RoleSet::TRANSPORTER.0 | RoleSet::RETAILER.0)),
            EventType::Sold => Some(RoleSet::RETAILER),
            EventType::Recalled => Some(RoleSet(RoleSet::PRODUCER.0 | RoleSet::AUDITOR.0)),
            EventType::Custom => Some(RoleSet::ALL),
        }
    }
}

/// One immutable journal entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub batch_id: BatchId,
    pub event_type: EventType,
    /// Content hash of the off-ledger payload; the payload itself is never
    /// stored on-ledger.
    pub data_hash: Hash32,
    pub actor: Address,
    pub counterparty: Option<Address>,
    pub timestamp: Timestamp,
}

/// Arena of event sequences keyed by batch id.
#[derive(Clone, Debug, Default)]
pub struct EventJournal {
    events: HashMap<BatchId, Vec<TraceEvent>>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an already-validated entry. Invoked by the custody machine
    /// only; preconditions live there.
    pub fn append(&mut self, event: TraceEvent) {
        self.events.entry(event.batch_id).or_default().push(event);
    }

    pub fn events_of(&self, batch_id: BatchId) -> TraceResult<&[TraceEvent]> {
        self.events
            .get(&batch_id)
            .map(Vec::as_slice)
            .ok_or(TraceError::BatchNotFound(batch_id))
    }

    pub fn len_of(&self, batch_id: BatchId) -> usize {
        self.events.get(&batch_id).map_or(0, Vec::len)
    }
}
