//! Certificate registry.
//!
//! Attestations issued by auditor organizations against a subject digest
//! (typically a batch-code hash). Revocation is restricted to the issuing
//! organization.

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::types::{CertId, Hash32, OrgId, Timestamp};

/// One issued certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertId,
    pub issuer_org_id: OrgId,
    pub subject: Hash32,
    pub metadata_cid: String,
    pub expire_at: Timestamp,
    pub active: bool,
}

/// Arena of certificates; ids are `index + 1`.
#[derive(Clone, Debug, Default)]
pub struct CertRegistry {
    certs: Vec<Certificate>,
}

impl CertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a certificate on behalf of an auditor organization. Auditor
    /// resolution happens in the facade.
    pub fn issue(
        &mut self,
        issuer_org_id: OrgId,
        subject: Hash32,
        metadata_cid: &str,
        expire_at: Timestamp,
    ) -> CertId {
        let id = self.certs.len() as CertId + 1;
        self.certs.push(Certificate {
            id,
            issuer_org_id,
            subject,
            metadata_cid: metadata_cid.to_string(),
            expire_at,
            active: true,
        });
        id
    }

    /// Deactivates a certificate; only the issuing organization may revoke.
    pub fn revoke(&mut self, id: CertId, revoker_org_id: OrgId) -> TraceResult<()> {
        let cert = id
            .checked_sub(1)
            .and_then(|idx| self.certs.get_mut(idx as usize))
            .ok_or(TraceError::CertNotFound(id))?;
        if cert.issuer_org_id != revoker_org_id {
            return Err(TraceError::NotAuthorizedToRevoke(id));
        }
        cert.active = false;
        Ok(())
    }

    pub fn get(&self, id: CertId) -> TraceResult<&Certificate> {
        id.checked_sub(1)
            .and_then(|idx| self.certs.get(idx as usize))
            .ok_or(TraceError::CertNotFound(id))
    }
}
