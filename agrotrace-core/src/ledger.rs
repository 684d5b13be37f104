//! Ledger facade.
//!
//! `TraceLedger` owns every component and is the only mutation path. Each
//! operation follows the same discipline: pause gate, existence, closed flag,
//! authorization, then mutation — every precondition is checked before any
//! state change, so a failed call never leaves a half-applied effect.
//!
//! Execution is strictly serialized: the ledger is a plain `&mut self` state
//! machine with no interior mutability, and identifier allocation is a
//! monotonic counter per namespace with no reuse.

use crate::access::{AccessRegistry, RoleSet};
use crate::anchor::{AnchorCommit, MerkleAnchorLedger};
use crate::catalog::{Product, ProductCatalog};
use crate::certs::{CertRegistry, Certificate};
use crate::codes::BatchCodeIndex;
use crate::custody::{plan_transition, Batch, BatchStatus, CustodyLedger};
use crate::error::{TraceError, TraceResult};
use crate::fees::FeeVault;
use crate::journal::{EventJournal, EventType, TraceEvent};
use crate::orgs::{Organization, OrganizationRegistry, ORG_TYPE_AUDITOR};
use crate::signals::{Signal, SignalLog};
use crate::telemetry::{TelemetryRecord, TelemetryStore};
use crate::types::{
    Address, AnchorId, BatchId, CertId, Clock, Hash32, OrgId, ProductId, TelemetryId, Timestamp,
};

/// Policy knobs for the custody machine.
#[derive(Clone, Copy, Debug)]
pub struct LedgerConfig {
    /// Whether Sold/Recalled events close the batch. Closure is a policy
    /// point, not a hard rule of the state machine.
    pub close_on_terminal: bool,
    /// Upper bound for `split_batch` child counts.
    pub max_split: u32,
    /// Fee charged on batch creation; zero disables the fee gate.
    pub create_batch_fee: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            close_on_terminal: true,
            max_split: 16,
            create_batch_fee: 0,
        }
    }
}

/// The traceability ledger: custody state machine, event journal, code
/// index, Merkle anchoring, and the surrounding registries, behind one
/// serialized mutation surface.
#[derive(Debug)]
pub struct TraceLedger {
    config: LedgerConfig,
    clock: Clock,
    access: AccessRegistry,
    catalog: ProductCatalog,
    custody: CustodyLedger,
    journal: EventJournal,
    codes: BatchCodeIndex,
    anchors: MerkleAnchorLedger,
    orgs: OrganizationRegistry,
    certs: CertRegistry,
    telemetry: TelemetryStore,
    fees: FeeVault,
    signals: SignalLog,
}

impl TraceLedger {
    pub fn new(owner: Address) -> Self {
        Self::with_components(owner, LedgerConfig::default(), Clock::system())
    }

    pub fn with_components(owner: Address, config: LedgerConfig, clock: Clock) -> Self {
        Self {
            fees: FeeVault::new(config.create_batch_fee),
            config,
            clock,
            access: AccessRegistry::new(owner),
            catalog: ProductCatalog::new(),
            custody: CustodyLedger::new(),
            journal: EventJournal::new(),
            codes: BatchCodeIndex::new(),
            anchors: MerkleAnchorLedger::new(),
            orgs: OrganizationRegistry::new(),
            certs: CertRegistry::new(),
            telemetry: TelemetryStore::new(),
            signals: SignalLog::new(),
        }
    }

    // ------------------------------------------------------------------
    // Access & pause registry
    // ------------------------------------------------------------------

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn paused(&self) -> bool {
        self.access.paused()
    }

    pub fn roles_of(&self, addr: Address) -> RoleSet {
        self.access.roles_of(addr)
    }

    pub fn is_committer(&self, addr: Address) -> bool {
        self.access.is_committer(addr)
    }

    /// Replaces the full role bitmask for an address. Owner-only.
    pub fn set_roles(&mut self, caller: Address, addr: Address, roles: RoleSet) -> TraceResult<()> {
        self.access.set_roles(caller, addr, roles)?;
        self.signals.push(Signal::RolesChanged { addr, roles });
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> TraceResult<()> {
        self.access.pause(caller)?;
        self.signals.push(Signal::PauseChanged { paused: true });
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> TraceResult<()> {
        self.access.unpause(caller)?;
        self.signals.push(Signal::PauseChanged { paused: false });
        Ok(())
    }

    pub fn add_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.access.add_committer(caller, addr)?;
        self.signals.push(Signal::CommitterAdded { addr });
        Ok(())
    }

    pub fn remove_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.access.remove_committer(caller, addr)?;
        self.signals.push(Signal::CommitterRemoved { addr });
        Ok(())
    }

    /// Replaces the primary committer and adds it to the allow-list.
    pub fn set_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.access.set_committer(caller, addr)?;
        self.signals.push(Signal::CommitterSet { addr });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Product catalog
    // ------------------------------------------------------------------

    pub fn create_product(
        &mut self,
        caller: Address,
        name: &str,
        metadata_uri: &str,
    ) -> TraceResult<ProductId> {
        self.access.ensure_not_paused()?;
        self.access.ensure_role(caller, RoleSet::PRODUCER)?;
        let id = self.catalog.create(name, metadata_uri, caller)?;
        self.signals.push(Signal::ProductCreated {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn get_product(&self, id: ProductId) -> TraceResult<&Product> {
        self.catalog.get(id)
    }

    // ------------------------------------------------------------------
    // Batch custody machine
    // ------------------------------------------------------------------

    /// Sole batch creation path; writes the synthetic `Created` journal
    /// entry atomically with the batch row.
    pub fn create_batch(
        &mut self,
        caller: Address,
        product_id: ProductId,
        data_hash: Hash32,
    ) -> TraceResult<BatchId> {
        self.create_batch_paid(caller, product_id, data_hash, 0)
    }

    /// Fee-bearing creation variant; `payment` must cover the configured fee.
    pub fn create_batch_paid(
        &mut self,
        caller: Address,
        product_id: ProductId,
        data_hash: Hash32,
        payment: u128,
    ) -> TraceResult<BatchId> {
        self.access.ensure_not_paused()?;
        self.access.ensure_role(caller, RoleSet::PRODUCER)?;
        if !self.catalog.exists(product_id) {
            return Err(TraceError::InvalidProduct(product_id));
        }
        self.fees.collect(caller, payment)?;
        if payment > 0 {
            self.signals.push(Signal::FeePaid {
                payer: caller,
                amount: payment,
            });
        }
        let id = self.spawn_batch(product_id, caller, Vec::new(), data_hash);
        Ok(id)
    }

    /// Records a trace event against the batch state machine.
    pub fn record_trace_event(
        &mut self,
        caller: Address,
        batch_id: BatchId,
        event_type: EventType,
        data_hash: Hash32,
        counterparty: Option<Address>,
    ) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        let roles = self.access.roles_of(caller);
        let batch = self.custody.get(batch_id)?;
        let effect = plan_transition(
            batch,
            caller,
            roles,
            event_type,
            counterparty,
            self.config.close_on_terminal,
        )?;
        self.custody.apply(batch_id, caller, effect);
        self.journal.append(TraceEvent {
            batch_id,
            event_type,
            data_hash,
            actor: caller,
            counterparty,
            timestamp: self.clock.now(),
        });
        self.signals.push(Signal::TraceEventRecorded {
            batch_id,
            event_type,
            actor: caller,
        });
        Ok(())
    }

    pub fn get_batch(&self, id: BatchId) -> TraceResult<&Batch> {
        self.custody.get(id)
    }

    pub fn get_batch_events(&self, batch_id: BatchId) -> TraceResult<&[TraceEvent]> {
        self.journal.events_of(batch_id)
    }

    /// Direct custody transfer outside the Shipped/Received protocol.
    /// Current owner only; the target must not belong to a deactivated
    /// organization.
    pub fn transfer_batch_owner(
        &mut self,
        caller: Address,
        batch_id: BatchId,
        new_owner: Address,
    ) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        let batch = self.custody.get(batch_id)?;
        if batch.closed {
            return Err(TraceError::BatchClosed(batch_id));
        }
        if batch.pending_receiver.is_some() {
            return Err(TraceError::Unauthorized(format!(
                "batch {batch_id} has a handoff in flight"
            )));
        }
        if batch.current_owner != caller {
            return Err(TraceError::Unauthorized(format!(
                "{caller} does not own batch {batch_id}"
            )));
        }
        if new_owner.is_zero() {
            return Err(TraceError::InvalidWallet);
        }
        if let Some(org) = self.orgs.by_wallet(new_owner) {
            if !org.active {
                return Err(TraceError::TargetInactive(org.id));
            }
        }
        self.custody.get_mut(batch_id)?.current_owner = new_owner;
        self.signals.push(Signal::BatchOwnerTransferred {
            batch_id,
            from: caller,
            to: new_owner,
        });
        Ok(())
    }

    /// Moves the coarse status forward; regression is rejected.
    pub fn update_batch_status(
        &mut self,
        caller: Address,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        let batch = self.custody.get(batch_id)?;
        if batch.closed {
            return Err(TraceError::BatchClosed(batch_id));
        }
        if batch.current_owner != caller {
            return Err(TraceError::Unauthorized(format!(
                "{caller} does not own batch {batch_id}"
            )));
        }
        if status < batch.status {
            return Err(TraceError::InvalidStateBackward {
                current: batch.status.ordinal(),
                requested: status.ordinal(),
            });
        }
        self.custody.get_mut(batch_id)?.status = status;
        self.signals.push(Signal::BatchStatusUpdated { batch_id, status });
        Ok(())
    }

    /// Divides one batch into `count` children recording lineage to the
    /// parent. The parent is consumed (closed).
    pub fn split_batch(
        &mut self,
        caller: Address,
        batch_id: BatchId,
        count: u32,
        data_hash: Hash32,
    ) -> TraceResult<Vec<BatchId>> {
        self.access.ensure_not_paused()?;
        if count < 1 || count > self.config.max_split {
            return Err(TraceError::BadCount(count));
        }
        let product_id = {
            let batch = self.custody.get(batch_id)?;
            self.ensure_consumable(batch, caller)?;
            batch.product_id
        };
        let children: Vec<BatchId> = (0..count)
            .map(|_| self.spawn_batch(product_id, caller, vec![batch_id], data_hash))
            .collect();
        let parent = self.custody.get_mut(batch_id)?;
        parent.children.extend_from_slice(&children);
        parent.closed = true;
        self.signals.push(Signal::BatchSplit {
            parent: batch_id,
            children: children.clone(),
        });
        Ok(children)
    }

    /// Combines two or more batches into one new batch recording all parents
    /// as lineage. The sources are consumed (closed).
    pub fn merge_batches(
        &mut self,
        caller: Address,
        sources: &[BatchId],
        product_id: ProductId,
        data_hash: Hash32,
    ) -> TraceResult<BatchId> {
        self.access.ensure_not_paused()?;
        if sources.len() < 2 {
            return Err(TraceError::BadSources(sources.len()));
        }
        let mut unique = sources.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != sources.len() {
            return Err(TraceError::BadSources(sources.len()));
        }
        if !self.catalog.exists(product_id) {
            return Err(TraceError::InvalidProduct(product_id));
        }
        for &source in sources {
            let batch = self.custody.get(source)?;
            self.ensure_consumable(batch, caller)?;
        }
        let child = self.spawn_batch(product_id, caller, sources.to_vec(), data_hash);
        for &source in sources {
            let batch = self.custody.get_mut(source)?;
            batch.children.push(child);
            batch.closed = true;
        }
        self.signals.push(Signal::BatchesMerged {
            sources: sources.to_vec(),
            child,
        });
        Ok(child)
    }

    fn ensure_consumable(&self, batch: &Batch, caller: Address) -> TraceResult<()> {
        if batch.closed {
            return Err(TraceError::BatchClosed(batch.id));
        }
        if batch.pending_receiver.is_some() {
            return Err(TraceError::Unauthorized(format!(
                "batch {} has a handoff in flight",
                batch.id
            )));
        }
        if batch.current_owner != caller {
            return Err(TraceError::Unauthorized(format!(
                "{caller} does not own batch {}",
                batch.id
            )));
        }
        Ok(())
    }

    /// Allocates a batch row and its index-0 `Created` journal entry in one
    /// step; there is no other path that writes either.
    fn spawn_batch(
        &mut self,
        product_id: ProductId,
        creator: Address,
        parents: Vec<BatchId>,
        data_hash: Hash32,
    ) -> BatchId {
        let now = self.clock.now();
        let id = self.custody.create(product_id, creator, parents, now);
        self.journal.append(TraceEvent {
            batch_id: id,
            event_type: EventType::Created,
            data_hash,
            actor: creator,
            counterparty: None,
            timestamp: now,
        });
        self.signals.push(Signal::BatchCreated {
            id,
            product_id,
            creator,
        });
        id
    }

    // ------------------------------------------------------------------
    // Batch code index
    // ------------------------------------------------------------------

    /// Binds a human-readable code to a batch. Callable by the batch's
    /// current owner or the registry owner.
    pub fn bind_batch_code(
        &mut self,
        caller: Address,
        batch_id: BatchId,
        code: &str,
    ) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        let batch = self.custody.get(batch_id)?;
        if caller != batch.current_owner && caller != self.access.owner() {
            return Err(TraceError::Unauthorized(format!(
                "{caller} may not bind a code to batch {batch_id}"
            )));
        }
        let now = self.clock.now();
        let code_hash = self.codes.bind_batch(code, batch_id, caller, now)?;
        self.signals.push(Signal::BatchCodeBound {
            batch_id,
            code_hash,
            code: code.to_string(),
        });
        Ok(())
    }

    /// Batch bound to a code in the event-batch namespace (1:1).
    pub fn get_batch_id_by_code(&self, code: &str) -> Option<BatchId> {
        self.codes.batch_by_code(code)
    }

    /// All targets bound to a code, event-batch binding first, then anchor
    /// commits in binding order.
    pub fn get_batch_ids_by_batch_code(&self, code: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self.codes.batch_by_code(code).into_iter().collect();
        ids.extend(self.codes.anchors_by_code(code));
        ids
    }

    /// Anchor commits bound to a code (1:N, binding order).
    pub fn get_anchor_ids_by_code(&self, code: &str) -> Vec<AnchorId> {
        self.codes.anchors_by_code(code)
    }

    // ------------------------------------------------------------------
    // Merkle anchor ledger
    // ------------------------------------------------------------------

    /// Commits a Merkle root for an externally maintained log segment.
    /// Committer allow-list only.
    pub fn commit_merkle_root(
        &mut self,
        caller: Address,
        root: Hash32,
        from_event_id: u64,
        to_event_id: u64,
    ) -> TraceResult<AnchorId> {
        self.access.ensure_not_paused()?;
        self.access.ensure_committer(caller)?;
        let now = self.clock.now();
        let anchor_id = self
            .anchors
            .commit(root, from_event_id, to_event_id, caller, now)?;
        self.signals.push(Signal::RootCommitted {
            anchor_id,
            root,
            from_event_id,
            to_event_id,
            committer: caller,
        });
        Ok(anchor_id)
    }

    /// Commits a root and binds a code to the new anchor in one atomic step;
    /// if the binding cannot succeed, no commit is retained.
    pub fn commit_with_batch_code(
        &mut self,
        caller: Address,
        root: Hash32,
        from_event_id: u64,
        to_event_id: u64,
        code: &str,
    ) -> TraceResult<AnchorId> {
        self.access.ensure_not_paused()?;
        self.access.ensure_committer(caller)?;
        // The anchor namespace appends, so the only bind failure is an empty
        // code; reject it before the commit mutates anything.
        if code.is_empty() {
            return Err(TraceError::InvalidInput("batch code required".into()));
        }
        let now = self.clock.now();
        let anchor_id = self
            .anchors
            .commit(root, from_event_id, to_event_id, caller, now)?;
        let code_hash = self.codes.bind_anchor(code, anchor_id, caller, now)?;
        self.signals.push(Signal::RootCommitted {
            anchor_id,
            root,
            from_event_id,
            to_event_id,
            committer: caller,
        });
        self.signals.push(Signal::AnchorCodeBound {
            anchor_id,
            code_hash,
            code: code.to_string(),
        });
        Ok(anchor_id)
    }

    pub fn get_anchor(&self, id: AnchorId) -> TraceResult<&AnchorCommit> {
        self.anchors.get(id)
    }

    pub fn total_anchors(&self) -> u64 {
        self.anchors.total()
    }

    // ------------------------------------------------------------------
    // Organization directory
    // ------------------------------------------------------------------

    pub fn register_organization(
        &mut self,
        caller: Address,
        wallet: Address,
        org_type: u8,
        name: &str,
        metadata_cid: &str,
        active: bool,
    ) -> TraceResult<OrgId> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(caller)?;
        let id = self.orgs.register(wallet, org_type, name, metadata_cid, active)?;
        self.signals.push(Signal::OrganizationRegistered { id, wallet });
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_organization(
        &mut self,
        caller: Address,
        id: OrgId,
        wallet: Address,
        org_type: u8,
        name: &str,
        metadata_cid: &str,
        active: bool,
    ) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(caller)?;
        self.orgs
            .update(id, wallet, org_type, name, metadata_cid, active)?;
        self.signals.push(Signal::OrganizationUpdated { id });
        Ok(())
    }

    pub fn get_organization(&self, id: OrgId) -> TraceResult<&Organization> {
        self.orgs.get(id)
    }

    pub fn organization_by_wallet(&self, wallet: Address) -> Option<&Organization> {
        self.orgs.by_wallet(wallet)
    }

    // ------------------------------------------------------------------
    // Certificate registry
    // ------------------------------------------------------------------

    /// Issues a certificate; the caller's organization must be an active
    /// auditor.
    pub fn issue_cert(
        &mut self,
        caller: Address,
        subject: Hash32,
        metadata_cid: &str,
        expire_at: Timestamp,
    ) -> TraceResult<CertId> {
        self.access.ensure_not_paused()?;
        let org = self
            .orgs
            .by_wallet(caller)
            .ok_or(TraceError::NotAuthorizedAsAuditor)?;
        if org.org_type != ORG_TYPE_AUDITOR {
            return Err(TraceError::NotAuthorizedAsAuditor);
        }
        if !org.active {
            return Err(TraceError::OrgInactive(org.id));
        }
        let issuer_org_id = org.id;
        let id = self.certs.issue(issuer_org_id, subject, metadata_cid, expire_at);
        self.signals.push(Signal::CertIssued { id, issuer_org_id });
        Ok(id)
    }

    pub fn revoke_cert(&mut self, caller: Address, id: CertId) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        let org_id = self
            .orgs
            .by_wallet(caller)
            .map(|org| org.id)
            .ok_or(TraceError::NotAuthorizedToRevoke(id))?;
        self.certs.revoke(id, org_id)?;
        self.signals.push(Signal::CertRevoked { id });
        Ok(())
    }

    pub fn get_cert(&self, id: CertId) -> TraceResult<&Certificate> {
        self.certs.get(id)
    }

    // ------------------------------------------------------------------
    // Telemetry anchors
    // ------------------------------------------------------------------

    pub fn anchor_telemetry(
        &mut self,
        caller: Address,
        root: Hash32,
        ref_type: u8,
        ref_id: u64,
        from_ts: Timestamp,
        to_ts: Timestamp,
        storage_uri: &str,
    ) -> TraceResult<TelemetryId> {
        self.access.ensure_not_paused()?;
        let actor_org_id = self.orgs.active_org_of(caller)?.id;
        let id = self
            .telemetry
            .anchor(root, ref_type, ref_id, from_ts, to_ts, storage_uri, actor_org_id)?;
        self.signals.push(Signal::TelemetryAnchored { id, ref_type, ref_id });
        Ok(id)
    }

    pub fn get_telemetry(&self, id: TelemetryId) -> TraceResult<&TelemetryRecord> {
        self.telemetry.get(id)
    }

    pub fn telemetry_by_ref(&self, ref_type: u8, ref_id: u64) -> Vec<&TelemetryRecord> {
        self.telemetry.by_ref(ref_type, ref_id)
    }

    // ------------------------------------------------------------------
    // Fees
    // ------------------------------------------------------------------

    pub fn set_create_batch_fee(&mut self, caller: Address, fee: u128) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(caller)?;
        self.fees.set_fee(fee);
        self.config.create_batch_fee = fee;
        self.signals.push(Signal::FeeUpdated { amount: fee });
        Ok(())
    }

    pub fn withdraw_fees(&mut self, caller: Address, to: Address, amount: u128) -> TraceResult<()> {
        self.access.ensure_not_paused()?;
        self.access.ensure_owner(caller)?;
        self.fees.withdraw(amount)?;
        self.signals.push(Signal::FeesWithdrawn { to, amount });
        Ok(())
    }

    pub fn fee_create_batch(&self) -> u128 {
        self.fees.fee_create_batch()
    }

    pub fn total_fee_collected(&self) -> u128 {
        self.fees.total_collected()
    }

    pub fn fee_balance(&self) -> u128 {
        self.fees.balance()
    }

    pub fn user_fees(&self, payer: Address) -> u128 {
        self.fees.user_fees(payer)
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub fn signals(&self) -> &[Signal] {
        self.signals.entries()
    }

    pub fn drain_signals(&mut self) -> Vec<Signal> {
        self.signals.drain()
    }
}
