//! Error taxonomy for the traceability ledger.
//!
//! Every precondition failure maps to a specific kind so callers can branch
//! on cause; there is no generic catch-all. Each kind carries a
//! machine-readable code and a suggested HTTP status for the service layer.

use thiserror::Error;

use crate::types::{AnchorId, BatchId, CertId, OrgId, ProductId, TelemetryId};

/// Result alias used throughout the crate.
pub type TraceResult<T> = Result<T, TraceError>;

/// Aggregated error type for all ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// Caller lacks the required role bit, is not the designated pending
    /// receiver, is not the owner, or attempts a self-targeted handoff.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Global pause flag is set; mutating entry points are rejected.
    #[error("contract paused")]
    ContractPaused,

    /// The batch is terminal; no further custody-mutating event is accepted.
    #[error("batch {0} is closed")]
    BatchClosed(BatchId),

    /// Product id does not resolve to an existing product.
    #[error("invalid product id {0}")]
    InvalidProduct(ProductId),

    /// Batch id does not resolve to an existing batch.
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    /// Anchor-commit id does not resolve to a stored commit.
    #[error("anchor {0} not found")]
    AnchorNotFound(AnchorId),

    /// Telemetry-anchor id does not resolve to a stored record.
    #[error("telemetry record {0} not found")]
    TelemetryNotFound(TelemetryId),

    /// `from` exceeds `to` in an asserted range.
    #[error("invalid range: from {from} > to {to}")]
    InvalidRange { from: u64, to: u64 },

    /// A zero digest where a real commitment is required.
    #[error("root must be non-zero")]
    RootZero,

    /// The Merkle root was already committed; roots are globally unique.
    #[error("root already committed")]
    RootAlreadyCommitted,

    /// The batch code hash is already bound in this namespace.
    #[error("batch code already used: {0}")]
    BatchCodeAlreadyUsed(String),

    /// Batch status may only move forward through the ordinal order.
    #[error("status regression: {requested} after {current}")]
    InvalidStateBackward { current: u8, requested: u8 },

    /// Split count outside `[1, max_split]`.
    #[error("bad split count {0}")]
    BadCount(u32),

    /// Merge requires at least two source batches.
    #[error("bad merge sources: got {0}")]
    BadSources(usize),

    /// Wallet already owns a registered organization.
    #[error("organization already registered for wallet")]
    OrgAlreadyRegistered,

    /// Organization id does not resolve.
    #[error("organization {0} not found")]
    OrgNotFound(OrgId),

    /// The acting wallet's organization is deactivated.
    #[error("organization {0} is inactive")]
    OrgInactive(OrgId),

    /// Transfer target belongs to a deactivated organization.
    #[error("target organization {0} is inactive")]
    TargetInactive(OrgId),

    /// Zero address where a real wallet is required.
    #[error("invalid wallet address")]
    InvalidWallet,

    /// Organization type outside the known range.
    #[error("invalid organization type {0}")]
    InvalidOrgType(u8),

    /// Caller's organization is not an active auditor.
    #[error("organization not authorized as auditor")]
    NotAuthorizedAsAuditor,

    /// Certificate id does not resolve.
    #[error("certificate {0} not found")]
    CertNotFound(CertId),

    /// Only the issuing organization may revoke a certificate.
    #[error("not authorized to revoke certificate {0}")]
    NotAuthorizedToRevoke(CertId),

    /// Telemetry reference type outside the known range.
    #[error("bad telemetry ref type {0}")]
    BadRefType(u8),

    /// Payment below the configured creation fee.
    #[error("insufficient fee: required {required}, paid {paid}")]
    InsufficientFee { required: u128, paid: u128 },

    /// Withdrawal exceeds the collected balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u128, requested: u128 },

    /// Malformed input not covered by a more specific kind (empty name,
    /// missing counterparty, reserved event type).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TraceError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TraceError::Unauthorized(_) => "UNAUTHORIZED",
            TraceError::ContractPaused => "CONTRACT_PAUSED",
            TraceError::BatchClosed(_) => "BATCH_CLOSED",
            TraceError::InvalidProduct(_) => "INVALID_PRODUCT",
            TraceError::BatchNotFound(_) => "BATCH_NOT_FOUND",
            TraceError::AnchorNotFound(_) => "ANCHOR_NOT_FOUND",
            TraceError::TelemetryNotFound(_) => "TELEMETRY_NOT_FOUND",
            TraceError::InvalidRange { .. } => "INVALID_RANGE",
            TraceError::RootZero => "ROOT_ZERO",
            TraceError::RootAlreadyCommitted => "ROOT_ALREADY_COMMITTED",
            TraceError::BatchCodeAlreadyUsed(_) => "BATCH_CODE_ALREADY_USED",
            TraceError::InvalidStateBackward { .. } => "INVALID_STATE_BACKWARD",
            TraceError::BadCount(_) => "BAD_COUNT",
            TraceError::BadSources(_) => "BAD_SOURCES",
            TraceError::OrgAlreadyRegistered => "ORG_ALREADY_REGISTERED",
            TraceError::OrgNotFound(_) => "ORG_NOT_FOUND",
            TraceError::OrgInactive(_) => "ORG_INACTIVE",
            TraceError::TargetInactive(_) => "TARGET_INACTIVE",
            TraceError::InvalidWallet => "INVALID_WALLET",
            TraceError::InvalidOrgType(_) => "INVALID_ORG_TYPE",
            TraceError::NotAuthorizedAsAuditor => "ORG_NOT_AUTHORIZED_AS_AUDITOR",
            TraceError::CertNotFound(_) => "CERT_NOT_FOUND",
            TraceError::NotAuthorizedToRevoke(_) => "NOT_AUTHORIZED_TO_REVOKE_CERT",
            TraceError::BadRefType(_) => "BAD_REFTYPE",
            TraceError::InsufficientFee { .. } => "INSUFFICIENT_FEE",
            TraceError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TraceError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// HTTP status suggestion for the service layer.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            TraceError::Unauthorized(_)
            | TraceError::NotAuthorizedAsAuditor
            | TraceError::NotAuthorizedToRevoke(_) => 403,
            TraceError::ContractPaused => 503,
            TraceError::InvalidProduct(_)
            | TraceError::BatchNotFound(_)
            | TraceError::AnchorNotFound(_)
            | TraceError::TelemetryNotFound(_)
            | TraceError::OrgNotFound(_)
            | TraceError::CertNotFound(_) => 404,
            TraceError::BatchClosed(_)
            | TraceError::RootAlreadyCommitted
            | TraceError::BatchCodeAlreadyUsed(_)
            | TraceError::InvalidStateBackward { .. }
            | TraceError::OrgAlreadyRegistered => 409,
            TraceError::InsufficientFee { .. } => 402,
            _ => 400,
        }
    }
}
