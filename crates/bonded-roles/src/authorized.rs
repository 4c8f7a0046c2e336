//! Authorized roles and registry keys

use bonded_core::{ClaimId, LedgerRef, NodeId, RoleClaim, RoleType, Timestamp};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of an authorized role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    /// Usable
    Active,
    /// Withdrawn by its owner or a security manager
    Revoked,
    /// Past `valid_until`, awaiting purge
    Expired,
}

impl fmt::Display for RoleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoleStatus::Active => "active",
            RoleStatus::Revoked => "revoked",
            RoleStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A role claim that passed verification
///
/// There is no public constructor: values come out of
/// [`ProofVerifier::verify`](crate::ProofVerifier::verify) and change status only
/// through the crate's own transitions, which return new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedRole {
    claim_id: ClaimId,
    node_id: NodeId,
    role: RoleType,
    bond_tx_ref: LedgerRef,
    valid_from: Timestamp,
    valid_until: Timestamp,
    status: RoleStatus,
}

impl AuthorizedRole {
    /// Derive the active role for a verified claim, clamping its lifetime
    pub(crate) fn from_verified(claim: &RoleClaim, max_lifetime: Duration) -> Self {
        let lifetime_cap = claim.claimed_at.saturating_add(max_lifetime);
        Self {
            claim_id: claim.claim_id,
            node_id: claim.node_id,
            role: claim.role,
            bond_tx_ref: claim.bond_tx_ref,
            valid_from: claim.claimed_at,
            valid_until: claim.expires_at.min(lifetime_cap),
            status: RoleStatus::Active,
        }
    }

    pub(crate) fn with_status(&self, status: RoleStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Originating claim
    pub fn claim_id(&self) -> ClaimId {
        self.claim_id
    }

    /// Holder
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Held role
    pub fn role(&self) -> RoleType {
        self.role
    }

    /// Bond backing the role
    pub fn bond_tx_ref(&self) -> LedgerRef {
        self.bond_tx_ref
    }

    /// Start of validity (the claim time)
    pub fn valid_from(&self) -> Timestamp {
        self.valid_from
    }

    /// End of validity, exclusive
    pub fn valid_until(&self) -> Timestamp {
        self.valid_until
    }

    /// Current status
    pub fn status(&self) -> RoleStatus {
        self.status
    }

    /// Registry key of this role
    pub fn key(&self) -> RegistryKey {
        RegistryKey::new(self.node_id, self.role)
    }

    /// Active and inside `[valid_from, valid_until)` at `at`
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.status == RoleStatus::Active && self.valid_from <= at && at < self.valid_until
    }
}

impl fmt::Display for AuthorizedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}, {}..{})",
            self.node_id, self.role, self.status, self.valid_from, self.valid_until
        )
    }
}

/// Registry key: one entry per node and role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegistryKey {
    /// Holder
    pub node_id: NodeId,
    /// Role
    pub role: RoleType,
}

impl RegistryKey {
    /// Create a key
    pub fn new(node_id: NodeId, role: RoleType) -> Self {
        Self { node_id, role }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonded_core::{hash, SigningKey};

    fn claim(claimed_at: u64, expires_at: u64) -> RoleClaim {
        let key = SigningKey::from_bytes(&[7; 32]);
        RoleClaim::sign(
            &key,
            NodeId::from_public_key(&key.verifying_key()),
            RoleType::Mediator,
            LedgerRef::new(hash(b"bond"), 0),
            Timestamp(claimed_at),
            Timestamp(expires_at),
        )
    }

    #[test]
    fn test_lifetime_is_clamped() {
        let role = AuthorizedRole::from_verified(&claim(100, 10_000), Duration::from_millis(500));
        assert_eq!(role.valid_from(), Timestamp(100));
        assert_eq!(role.valid_until(), Timestamp(600));

        let role = AuthorizedRole::from_verified(&claim(100, 200), Duration::from_millis(500));
        assert_eq!(role.valid_until(), Timestamp(200));
    }

    #[test]
    fn test_validity_window_is_half_open() {
        let role = AuthorizedRole::from_verified(&claim(100, 200), Duration::from_secs(60));
        assert!(!role.is_valid_at(Timestamp(99)));
        assert!(role.is_valid_at(Timestamp(100)));
        assert!(role.is_valid_at(Timestamp(199)));
        assert!(!role.is_valid_at(Timestamp(200)));
        assert!(!role
            .with_status(RoleStatus::Revoked)
            .is_valid_at(Timestamp(150)));
    }

    #[test]
    fn test_status_transition_returns_new_value() {
        let active = AuthorizedRole::from_verified(&claim(100, 200), Duration::from_secs(60));
        let revoked = active.with_status(RoleStatus::Revoked);
        assert_eq!(active.status(), RoleStatus::Active);
        assert_eq!(revoked.status(), RoleStatus::Revoked);
        assert_eq!(revoked.claim_id(), active.claim_id());
    }
}
