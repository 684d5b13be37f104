//! Organization directory.
//!
//! Wallet-to-organization registry: identity, type, metadata pointer, and an
//! active flag consulted by custody transfers, telemetry anchoring, and
//! certificate issuance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TraceError, TraceResult};
use crate::types::{Address, OrgId};

/// Known organization types; the numeric codes are part of the wire format.
pub const ORG_TYPE_FARM: u8 = 1;
pub const ORG_TYPE_PROCESSOR: u8 = 2;
pub const ORG_TYPE_DISTRIBUTOR: u8 = 3;
pub const ORG_TYPE_RETAILER: u8 = 4;
pub const ORG_TYPE_AUDITOR: u8 = 5;

/// One registered organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub wallet: Address,
    pub org_type: u8,
    pub name: String,
    pub metadata_cid: String,
    pub active: bool,
}

/// Arena of organizations with a wallet reverse index; ids are `index + 1`.
#[derive(Clone, Debug, Default)]
pub struct OrganizationRegistry {
    orgs: Vec<Organization>,
    by_wallet: HashMap<Address, OrgId>,
}

impl OrganizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new organization. One organization per wallet.
    pub fn register(
        &mut self,
        wallet: Address,
        org_type: u8,
        name: &str,
        metadata_cid: &str,
        active: bool,
    ) -> TraceResult<OrgId> {
        if wallet.is_zero() {
            return Err(TraceError::InvalidWallet);
        }
        Self::validate_org_type(org_type)?;
        if self.by_wallet.contains_key(&wallet) {
            return Err(TraceError::OrgAlreadyRegistered);
        }
        let id = self.orgs.len() as OrgId + 1;
        self.orgs.push(Organization {
            id,
            wallet,
            org_type,
            name: name.to_string(),
            metadata_cid: metadata_cid.to_string(),
            active,
        });
        self.by_wallet.insert(wallet, id);
        Ok(id)
    }

    /// Replaces an organization's record, keeping the wallet index coherent.
    pub fn update(
        &mut self,
        id: OrgId,
        wallet: Address,
        org_type: u8,
        name: &str,
        metadata_cid: &str,
        active: bool,
    ) -> TraceResult<()> {
        if wallet.is_zero() {
            return Err(TraceError::InvalidWallet);
        }
        Self::validate_org_type(org_type)?;
        if let Some(&other) = self.by_wallet.get(&wallet) {
            if other != id {
                return Err(TraceError::OrgAlreadyRegistered);
            }
        }
        let idx = id
            .checked_sub(1)
            .filter(|&i| (i as usize) < self.orgs.len())
            .ok_or(TraceError::OrgNotFound(id))? as usize;

        let old_wallet = self.orgs[idx].wallet;
        self.by_wallet.remove(&old_wallet);
        self.by_wallet.insert(wallet, id);
        self.orgs[idx] = Organization {
            id,
            wallet,
            org_type,
            name: name.to_string(),
            metadata_cid: metadata_cid.to_string(),
            active,
        };
        Ok(())
    }

    pub fn get(&self, id: OrgId) -> TraceResult<&Organization> {
        id.checked_sub(1)
            .and_then(|idx| self.orgs.get(idx as usize))
            .ok_or(TraceError::OrgNotFound(id))
    }

    pub fn by_wallet(&self, wallet: Address) -> Option<&Organization> {
        self.by_wallet
            .get(&wallet)
            .and_then(|&id| self.orgs.get(id as usize - 1))
    }

    /// Resolves a wallet to its active organization.
    pub fn active_org_of(&self, wallet: Address) -> TraceResult<&Organization> {
        let org = self
            .by_wallet(wallet)
            .ok_or_else(|| TraceError::Unauthorized(format!("{wallet} has no organization")))?;
        if !org.active {
            return Err(TraceError::OrgInactive(org.id));
        }
        Ok(org)
    }

    fn validate_org_type(org_type: u8) -> TraceResult<()> {
        if !(ORG_TYPE_FARM..=ORG_TYPE_AUDITOR).contains(&org_type) {
            return Err(TraceError::InvalidOrgType(org_type));
        }
        Ok(())
    }
}
