//! Merkle anchor ledger.
//!
//! Commits `(root, event-id-range, committer, timestamp)` tuples representing
//! externally maintained event-log segments. The ledger's job is
//! tamper-evidence of the commitment: roots are globally unique and ranges
//! are caller-asserted, not verified against a separate source of truth.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{TraceError, TraceResult};
use crate::types::{Address, AnchorId, Hash32, Timestamp};

/// One committed log segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCommit {
    pub id: AnchorId,
    pub root: Hash32,
    pub from_event_id: u64,
    pub to_event_id: u64,
    pub committer: Address,
    pub timestamp: Timestamp,
}

/// Arena of commits plus the root dedup set; ids are `index + 1`.
#[derive(Clone, Debug, Default)]
pub struct MerkleAnchorLedger {
    commits: Vec<AnchorCommit>,
    seen_roots: HashSet<Hash32>,
}

impl MerkleAnchorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a commitment. Committer authorization and the pause gate are
    /// checked by the facade before this runs.
    pub fn commit(
        &mut self,
        root: Hash32,
        from_event_id: u64,
        to_event_id: u64,
        committer: Address,
        timestamp: Timestamp,
    ) -> TraceResult<AnchorId> {
        if from_event_id > to_event_id {
            return Err(TraceError::InvalidRange {
                from: from_event_id,
                to: to_event_id,
            });
        }
        if root.is_zero() {
            return Err(TraceError::RootZero);
        }
        if self.seen_roots.contains(&root) {
            return Err(TraceError::RootAlreadyCommitted);
        }
        let id = self.commits.len() as AnchorId + 1;
        self.seen_roots.insert(root);
        self.commits.push(AnchorCommit {
            id,
            root,
            from_event_id,
            to_event_id,
            committer,
            timestamp,
        });
        Ok(id)
    }

    pub fn get(&self, id: AnchorId) -> TraceResult<&AnchorCommit> {
        id.checked_sub(1)
            .and_then(|idx| self.commits.get(idx as usize))
            .ok_or(TraceError::AnchorNotFound(id))
    }

    pub fn total(&self) -> u64 {
        self.commits.len() as u64
    }
}
