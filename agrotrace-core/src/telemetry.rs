//! Telemetry anchor store.
//!
//! Time-ranged sensor-reading commitments linked to a batch or product. Only
//! the digest of a reading window is anchored; the payload lives off-ledger
//! at `storage_uri`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TraceError, TraceResult};
use crate::types::{Hash32, OrgId, TelemetryId, Timestamp};

/// Reference target for a telemetry window; codes are part of the wire format.
pub const REF_TYPE_BATCH: u8 = 1;
pub const REF_TYPE_PRODUCT: u8 = 2;

/// One anchored telemetry window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: TelemetryId,
    pub root: Hash32,
    pub ref_type: u8,
    pub ref_id: u64,
    pub from_ts: Timestamp,
    pub to_ts: Timestamp,
    pub storage_uri: String,
    pub actor_org_id: OrgId,
}

/// Arena of telemetry records with a by-reference index.
#[derive(Clone, Debug, Default)]
pub struct TelemetryStore {
    records: Vec<TelemetryRecord>,
    by_ref: HashMap<(u8, u64), Vec<TelemetryId>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors a telemetry window. Active-organization resolution happens in
    /// the facade.
    pub fn anchor(
        &mut self,
        root: Hash32,
        ref_type: u8,
        ref_id: u64,
        from_ts: Timestamp,
        to_ts: Timestamp,
        storage_uri: &str,
        actor_org_id: OrgId,
    ) -> TraceResult<TelemetryId> {
        if root.is_zero() {
            return Err(TraceError::RootZero);
        }
        if ref_type != REF_TYPE_BATCH && ref_type != REF_TYPE_PRODUCT {
            return Err(TraceError::BadRefType(ref_type));
        }
        if from_ts > to_ts {
            return Err(TraceError::InvalidRange {
                from: from_ts,
                to: to_ts,
            });
        }
        let id = self.records.len() as TelemetryId + 1;
        self.records.push(TelemetryRecord {
            id,
            root,
            ref_type,
            ref_id,
            from_ts,
            to_ts,
            storage_uri: storage_uri.to_string(),
            actor_org_id,
        });
        self.by_ref.entry((ref_type, ref_id)).or_default().push(id);
        Ok(id)
    }

    pub fn get(&self, id: TelemetryId) -> TraceResult<&TelemetryRecord> {
        id.checked_sub(1)
            .and_then(|idx| self.records.get(idx as usize))
            .ok_or(TraceError::TelemetryNotFound(id))
    }

    /// Records for one reference, in anchoring order.
    pub fn by_ref(&self, ref_type: u8, ref_id: u64) -> Vec<&TelemetryRecord> {
        self.by_ref
            .get(&(ref_type, ref_id))
            .map(|ids| {
                ids.iter()
                    .map(|&id| &self.records[id as usize - 1])
                    .collect()
            })
            .unwrap_or_default()
    }
}
