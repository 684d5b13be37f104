//! Batch custody machine.
//!
//! Owns batch identity, current/pending custodian, status, lineage, and the
//! closed flag. Transition validation is split from application: a planned
//! transition is computed against the current state and only applied once
//! every precondition has passed, so a rejected call never mutates anything.

use serde::{Deserialize, Serialize};

use crate::access::RoleSet;
use crate::error::{TraceError, TraceResult};
use crate::journal::EventType;
use crate::types::{Address, BatchId, ProductId, Timestamp};

/// Coarse progress status, monotonically non-decreasing per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BatchStatus {
    Created,
    Processing,
    Packed,
    InTransit,
    Delivered,
}

impl BatchStatus {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

/// A trackable unit of goods moving through custody.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub product_id: ProductId,
    pub creator: Address,
    pub current_owner: Address,
    /// Set between a Shipped event and its matching Received event;
    /// `None` otherwise.
    pub pending_receiver: Option<Address>,
    pub status: BatchStatus,
    pub closed: bool,
    /// Lineage: source batches this one was split or merged from.
    pub parents: Vec<BatchId>,
    /// Lineage: batches split or merged out of this one.
    pub children: Vec<BatchId>,
    pub created_at: Timestamp,
}

/// Custody mutation computed by [`plan_transition`], applied only after all
/// preconditions passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustodyEffect {
    /// Idle -> Idle; journal entry only.
    None,
    /// Idle -> PendingHandoff.
    SetPending(Address),
    /// PendingHandoff -> Idle with the caller as new owner.
    AcceptHandoff,
    /// Idle -> Closed.
    Close,
}

/// Validates a trace event against the batch state machine and the caller's
/// capabilities, returning the custody effect to apply.
///
/// Check order: closed flag, then role/address authorization. The global
/// pause flag is checked by the ledger facade before this runs.
pub fn plan_transition(
    batch: &Batch,
    caller: Address,
    caller_roles: RoleSet,
    event_type: EventType,
    counterparty: Option<Address>,
    close_on_terminal: bool,
) -> TraceResult<CustodyEffect> {
    if batch.closed {
        return Err(TraceError::BatchClosed(batch.id));
    }
    if event_type == EventType::Created {
        return Err(TraceError::InvalidInput(
            "Created is written atomically with batch creation".into(),
        ));
    }

    if event_type == EventType::Received {
        // Address-bound capability: only the stored pending receiver may
        // complete the handoff, regardless of role bits.
        return match batch.pending_receiver {
            Some(receiver) if receiver == caller => Ok(CustodyEffect::AcceptHandoff),
            Some(_) => Err(TraceError::Unauthorized(format!(
                "{caller} is not the pending receiver of batch {}",
                batch.id
            ))),
            None => Err(TraceError::Unauthorized(format!(
                "batch {} has no pending handoff",
                batch.id
            ))),
        };
    }

    // All remaining transitions start from Idle.
    if batch.pending_receiver.is_some() {
        return Err(TraceError::Unauthorized(format!(
            "batch {} has a handoff in flight",
            batch.id
        )));
    }

    let Some(required) = event_type.required_roles() else {
        return Err(TraceError::InvalidInput(format!(
            "{event_type:?} is not a role-gated event type"
        )));
    };
    if !caller_roles.intersects(required) {
        return Err(TraceError::Unauthorized(format!(
            "{caller} lacks required role bits {required} for {event_type:?}"
        )));
    }

    match event_type {
        EventType::Shipped => {
            let target = counterparty.ok_or_else(|| {
                TraceError::InvalidInput("Shipped requires a counterparty".into())
            })?;
            if target.is_zero() {
                return Err(TraceError::InvalidInput(
                    "Shipped counterparty must be non-zero".into(),
                ));
            }
            if target == caller {
                return Err(TraceError::Unauthorized(
                    "cannot ship a batch to self".into(),
                ));
            }
            Ok(CustodyEffect::SetPending(target))
        }
        ty if ty.is_terminal() && close_on_terminal => Ok(CustodyEffect::Close),
        _ => Ok(CustodyEffect::None),
    }
}

/// Arena of batches; ids are `index + 1`. Batches are never deleted.
#[derive(Clone, Debug, Default)]
pub struct CustodyLedger {
    batches: Vec<Batch>,
}

impl CustodyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequential batch id with the caller as creator and
    /// current owner. Product resolution and role checks live in the facade.
    pub fn create(
        &mut self,
        product_id: ProductId,
        creator: Address,
        parents: Vec<BatchId>,
        created_at: Timestamp,
    ) -> BatchId {
        let id = self.batches.len() as BatchId + 1;
        self.batches.push(Batch {
            id,
            product_id,
            creator,
            current_owner: creator,
            pending_receiver: None,
            status: BatchStatus::Created,
            closed: false,
            parents,
            children: Vec::new(),
            created_at,
        });
        id
    }

    pub fn get(&self, id: BatchId) -> TraceResult<&Batch> {
        id.checked_sub(1)
            .and_then(|idx| self.batches.get(idx as usize))
            .ok_or(TraceError::BatchNotFound(id))
    }

    pub fn get_mut(&mut self, id: BatchId) -> TraceResult<&mut Batch> {
        id.checked_sub(1)
            .and_then(|idx| self.batches.get_mut(idx as usize))
            .ok_or(TraceError::BatchNotFound(id))
    }

    pub fn next_id(&self) -> BatchId {
        self.batches.len() as BatchId + 1
    }

    /// Applies a planned custody effect. Infallible: validation already
    /// happened in [`plan_transition`].
    pub fn apply(&mut self, id: BatchId, caller: Address, effect: CustodyEffect) {
        let batch = self
            .get_mut(id)
            .expect("effect was planned against an existing batch");
        match effect {
            CustodyEffect::None => {}
            CustodyEffect::SetPending(target) => batch.pending_receiver = Some(target),
            CustodyEffect::AcceptHandoff => {
                batch.pending_receiver = None;
                batch.current_owner = caller;
            }
            CustodyEffect::Close => batch.closed = true,
        }
    }
}
