//! Access and pause registry.
//!
//! Owner identity, the emergency pause flag, the per-address role bitmask
//! table, and the allow-list of addresses permitted to anchor Merkle
//! commitments. Every mutating entry point of the other components consults
//! this registry first.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::types::Address;

/// Capability bitmask. Each role occupies one fixed bit; an address may hold
/// any combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(pub u32);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);
    pub const PRODUCER: RoleSet = RoleSet(1 << 0);
    pub const PROCESSOR: RoleSet = RoleSet(1 << 1);
    pub const TRANSPORTER: RoleSet = RoleSet(1 << 2);
    pub const RETAILER: RoleSet = RoleSet(1 << 3);
    pub const AUDITOR: RoleSet = RoleSet(1 << 4);

    /// All defined role bits.
    pub const ALL: RoleSet = RoleSet(0b1_1111);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when any bit of `other` is held.
    pub const fn intersects(self, other: RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: RoleSet) -> RoleSet {
        RoleSet(self.0 | other.0)
    }
}

impl std::ops::BitOr for RoleSet {
    type Output = RoleSet;

    fn bitor(self, rhs: RoleSet) -> RoleSet {
        self.union(rhs)
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07b}", self.0)
    }
}

/// Owner identity, pause flag, role table, and committer allow-list.
#[derive(Clone, Debug)]
pub struct AccessRegistry {
    owner: Address,
    paused: bool,
    roles: HashMap<Address, RoleSet>,
    committers: HashSet<Address>,
    primary_committer: Option<Address>,
}

impl AccessRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            paused: false,
            roles: HashMap::new(),
            committers: HashSet::new(),
            primary_committer: None,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn ensure_owner(&self, caller: Address) -> TraceResult<()> {
        if caller != self.owner {
            return Err(TraceError::Unauthorized(format!(
                "{caller} is not the registry owner"
            )));
        }
        Ok(())
    }

    /// Checked before any state change in every mutating operation.
    pub fn ensure_not_paused(&self) -> TraceResult<()> {
        if self.paused {
            return Err(TraceError::ContractPaused);
        }
        Ok(())
    }

    /// Replaces the full bitmask for an address (not additive). Owner-only.
    pub fn set_roles(&mut self, caller: Address, addr: Address, roles: RoleSet) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.roles.insert(addr, roles);
        Ok(())
    }

    pub fn roles_of(&self, addr: Address) -> RoleSet {
        self.roles.get(&addr).copied().unwrap_or(RoleSet::EMPTY)
    }

    /// Passes when the caller holds any of the required bits.
    pub fn ensure_role(&self, caller: Address, required: RoleSet) -> TraceResult<()> {
        if !self.roles_of(caller).intersects(required) {
            return Err(TraceError::Unauthorized(format!(
                "{caller} lacks required role bits {required}"
            )));
        }
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.paused = false;
        Ok(())
    }

    pub fn add_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.committers.insert(addr);
        Ok(())
    }

    pub fn remove_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.committers.remove(&addr);
        if self.primary_committer == Some(addr) {
            self.primary_committer = None;
        }
        Ok(())
    }

    /// Replaces the primary committer and adds it to the allow-list.
    pub fn set_committer(&mut self, caller: Address, addr: Address) -> TraceResult<()> {
        self.ensure_owner(caller)?;
        self.primary_committer = Some(addr);
        self.committers.insert(addr);
        Ok(())
    }

    pub fn primary_committer(&self) -> Option<Address> {
        self.primary_committer
    }

    pub fn is_committer(&self, addr: Address) -> bool {
        self.committers.contains(&addr)
    }

    pub fn ensure_committer(&self, caller: Address) -> TraceResult<()> {
        if !self.is_committer(caller) {
            return Err(TraceError::Unauthorized(format!(
                "{caller} is not an allowed committer"
            )));
        }
        Ok(())
    }
}
