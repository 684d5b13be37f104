//! Supply-chain traceability ledger.
//!
//! Tracks physical goods ("batches") as they move between custodians and
//! keeps a tamper-evident audit trail of what happened to each batch. Two
//! subsystems form the trust-critical core:
//!
//! - the **custody state machine**: who may act on a batch, in what order,
//!   and how ownership changes hands (the two-step Shipped → Received
//!   handoff, terminal closure on Sold/Recalled, split/merge lineage);
//! - the **Merkle anchoring ledger**: compact, immutable commitments of
//!   large off-ledger event logs, with human-readable batch codes bound to
//!   them for discovery.
//!
//! Callers are identified by their address; a role bitmask gates which event
//! types an address may record, while the `Received` half of a handoff is
//! bound to the pending receiver's address rather than any role. All
//! mutation flows through [`TraceLedger`], which checks every precondition
//! before touching state.

pub mod access;
pub mod anchor;
pub mod catalog;
pub mod certs;
pub mod codes;
pub mod custody;
pub mod error;
pub mod fees;
pub mod journal;
pub mod ledger;
pub mod orgs;
pub mod signals;
pub mod telemetry;
pub mod types;

pub use access::{AccessRegistry, RoleSet};
pub use anchor::{AnchorCommit, MerkleAnchorLedger};
pub use catalog::{Product, ProductCatalog};
pub use certs::{CertRegistry, Certificate};
pub use codes::{code_hash, BatchCodeIndex, CodeBinding};
pub use custody::{Batch, BatchStatus, CustodyLedger};
pub use error::{TraceError, TraceResult};
pub use fees::FeeVault;
pub use journal::{EventJournal, EventType, TraceEvent};
pub use ledger::{LedgerConfig, TraceLedger};
pub use orgs::{Organization, OrganizationRegistry};
pub use signals::{Signal, SignalLog};
pub use telemetry::{TelemetryRecord, TelemetryStore};
pub use types::{
    Address, AnchorId, BatchId, CertId, Clock, Hash32, OrgId, ProductId, TelemetryId, Timestamp,
};
