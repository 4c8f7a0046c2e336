//! Role and revocation claims
//!
//! Claims are immutable once signed. Their canonical encodings are fixed-width
//! big-endian byte strings prefixed with a domain tag, so the same fields always
//! produce the same bytes independent of any serialization format used on the
//! wire or on disk.

use crate::hash::hasher;
use crate::{ClaimId, LedgerRef, NodeId, PublicKey, RoleType, Signature, SigningKey, Timestamp};
use ed25519_dalek::{SignatureError, Signer};
use serde::{Deserialize, Serialize};

const CLAIM_ID_DOMAIN: &[u8] = b"bonded/claim-id/v1";
const CLAIM_SIG_DOMAIN: &[u8] = b"bonded/role-claim/v1";
const REVOCATION_SIG_DOMAIN: &[u8] = b"bonded/revocation/v1";

/// A node's signed assertion that it holds a bonded role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    /// Content-derived identifier, see [`RoleClaim::compute_id`]
    pub claim_id: ClaimId,
    /// Claiming node
    pub node_id: NodeId,
    /// Claimed role
    pub role: RoleType,
    /// Ledger output locking the bond
    pub bond_tx_ref: LedgerRef,
    /// Signature by the node's key over [`RoleClaim::signing_payload`]
    pub signature: Signature,
    /// When the claim was made
    pub claimed_at: Timestamp,
    /// When the claim stops being valid
    pub expires_at: Timestamp,
}

impl RoleClaim {
    /// Compute the claim identifier from the identifying fields
    pub fn compute_id(
        node_id: &NodeId,
        role: RoleType,
        bond_tx_ref: &LedgerRef,
        claimed_at: Timestamp,
    ) -> ClaimId {
        let mut h = hasher();
        h.update(CLAIM_ID_DOMAIN);
        h.update(node_id.as_bytes());
        h.update(&[role.code()]);
        h.update(&bond_tx_ref.to_bytes());
        h.update(&claimed_at.to_be_bytes());
        ClaimId::new(h.finalize())
    }

    /// Build and sign a claim
    pub fn sign(
        signing_key: &SigningKey,
        node_id: NodeId,
        role: RoleType,
        bond_tx_ref: LedgerRef,
        claimed_at: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        let claim_id = Self::compute_id(&node_id, role, &bond_tx_ref, claimed_at);
        let payload = claim_payload(
            &claim_id,
            &node_id,
            role,
            &bond_tx_ref,
            claimed_at,
            expires_at,
        );
        Self {
            claim_id,
            node_id,
            role,
            bond_tx_ref,
            signature: signing_key.sign(&payload),
            claimed_at,
            expires_at,
        }
    }

    /// Whether the carried identifier matches the identifying fields
    pub fn has_consistent_id(&self) -> bool {
        self.claim_id
            == Self::compute_id(&self.node_id, self.role, &self.bond_tx_ref, self.claimed_at)
    }

    /// Canonical bytes covered by the signature
    pub fn signing_payload(&self) -> Vec<u8> {
        claim_payload(
            &self.claim_id,
            &self.node_id,
            self.role,
            &self.bond_tx_ref,
            self.claimed_at,
            self.expires_at,
        )
    }

    /// Verify the signature with the claimant's public key
    pub fn verify_signature(&self, key: &PublicKey) -> Result<(), SignatureError> {
        key.verify_strict(&self.signing_payload(), &self.signature)
    }
}

fn claim_payload(
    claim_id: &ClaimId,
    node_id: &NodeId,
    role: RoleType,
    bond_tx_ref: &LedgerRef,
    claimed_at: Timestamp,
    expires_at: Timestamp,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(CLAIM_SIG_DOMAIN.len() + 32 + 32 + 1 + 36 + 16);
    out.extend_from_slice(CLAIM_SIG_DOMAIN);
    out.extend_from_slice(claim_id.as_bytes());
    out.extend_from_slice(node_id.as_bytes());
    out.push(role.code());
    out.extend_from_slice(&bond_tx_ref.to_bytes());
    out.extend_from_slice(&claimed_at.to_be_bytes());
    out.extend_from_slice(&expires_at.to_be_bytes());
    out
}

/// Signed withdrawal of a previously made role claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationClaim {
    /// Claim being revoked
    pub target_claim_id: ClaimId,
    /// Node issuing the revocation
    pub revoker_node_id: NodeId,
    /// Signature by the revoker over [`RevocationClaim::signing_payload`]
    pub signature: Signature,
    /// When the revocation takes effect
    pub revoked_at: Timestamp,
}

impl RevocationClaim {
    /// Build and sign a revocation
    pub fn sign(
        signing_key: &SigningKey,
        target_claim_id: ClaimId,
        revoker_node_id: NodeId,
        revoked_at: Timestamp,
    ) -> Self {
        let payload = revocation_payload(&target_claim_id, &revoker_node_id, revoked_at);
        Self {
            target_claim_id,
            revoker_node_id,
            signature: signing_key.sign(&payload),
            revoked_at,
        }
    }

    /// Canonical bytes covered by the signature
    pub fn signing_payload(&self) -> Vec<u8> {
        revocation_payload(&self.target_claim_id, &self.revoker_node_id, self.revoked_at)
    }

    /// Verify the signature with the revoker's public key
    pub fn verify_signature(&self, key: &PublicKey) -> Result<(), SignatureError> {
        key.verify_strict(&self.signing_payload(), &self.signature)
    }
}

fn revocation_payload(target: &ClaimId, revoker: &NodeId, revoked_at: Timestamp) -> Vec<u8> {
    let mut out = Vec::with_capacity(REVOCATION_SIG_DOMAIN.len() + 32 + 32 + 8);
    out.extend_from_slice(REVOCATION_SIG_DOMAIN);
    out.extend_from_slice(target.as_bytes());
    out.extend_from_slice(revoker.as_bytes());
    out.extend_from_slice(&revoked_at.to_be_bytes());
    out
}
