//! Batch code index.
//!
//! Bidirectional binding between a human-readable code and ledger targets.
//! Two separate keyed tables with different cardinality rules: the
//! event-batch namespace is strictly 1:1 (a code maps to one batch,
//! permanently), the anchor-commit namespace is 1:N (one code may be rebound
//! across successive anchor commits for the same logical shipment lot).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TraceError, TraceResult};
use crate::types::{Address, AnchorId, BatchId, Hash32, Timestamp};

/// One recorded binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBinding {
    pub code_hash: Hash32,
    pub code: String,
    pub target: u64,
    pub bound_by: Address,
    pub bound_at: Timestamp,
}

/// Hash used as the lookup key for a human code.
pub fn code_hash(code: &str) -> Hash32 {
    Hash32::digest(code.as_bytes())
}

/// The two binding tables.
#[derive(Clone, Debug, Default)]
pub struct BatchCodeIndex {
    batch_codes: HashMap<Hash32, CodeBinding>,
    anchor_codes: HashMap<Hash32, Vec<CodeBinding>>,
}

impl BatchCodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a code to a batch. Rejects rebinding: the event-batch namespace
    /// enforces one code, one batch, permanently.
    pub fn bind_batch(
        &mut self,
        code: &str,
        batch_id: BatchId,
        bound_by: Address,
        bound_at: Timestamp,
    ) -> TraceResult<Hash32> {
        let hash = Self::validated_hash(code)?;
        if self.batch_codes.contains_key(&hash) {
            return Err(TraceError::BatchCodeAlreadyUsed(code.to_string()));
        }
        self.batch_codes.insert(
            hash,
            CodeBinding {
                code_hash: hash,
                code: code.to_string(),
                target: batch_id,
                bound_by,
                bound_at,
            },
        );
        Ok(hash)
    }

    /// Binds a code to an anchor commit, appending to the code's sequence.
    pub fn bind_anchor(
        &mut self,
        code: &str,
        anchor_id: AnchorId,
        bound_by: Address,
        bound_at: Timestamp,
    ) -> TraceResult<Hash32> {
        let hash = Self::validated_hash(code)?;
        self.anchor_codes.entry(hash).or_default().push(CodeBinding {
            code_hash: hash,
            code: code.to_string(),
            target: anchor_id,
            bound_by,
            bound_at,
        });
        Ok(hash)
    }

    pub fn batch_by_code(&self, code: &str) -> Option<BatchId> {
        self.batch_codes.get(&code_hash(code)).map(|b| b.target)
    }

    /// Anchor ids bound to a code, in binding order.
    pub fn anchors_by_code(&self, code: &str) -> Vec<AnchorId> {
        self.anchor_codes
            .get(&code_hash(code))
            .map(|bindings| bindings.iter().map(|b| b.target).collect())
            .unwrap_or_default()
    }

    fn validated_hash(code: &str) -> TraceResult<Hash32> {
        if code.is_empty() {
            return Err(TraceError::InvalidInput("batch code required".into()));
        }
        Ok(code_hash(code))
    }
}
