//! Error taxonomy for bonded role handling
//!
//! Nothing here is fatal. Every variant describes why a single claim or
//! revocation was dropped; the registry keeps running and stays consistent.

use crate::authorized::RoleStatus;
use bonded_core::{BondAmount, BondedError, ClaimId, LedgerRef, NodeId, RoleType, Timestamp};

/// Why a role claim failed verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Signature invalid, or the claim is malformed or future-dated
    #[error("Bad signature on claim from {node_id}: {reason}")]
    BadSignature {
        /// Claimant
        node_id: NodeId,
        /// What was wrong
        reason: String,
    },

    /// Bond amount or depth below what the role requires
    #[error("Insufficient bond for {role}: required {required}, got {actual} ({reason})")]
    InsufficientBond {
        /// Claimed role
        role: RoleType,
        /// Configured minimum
        required: BondAmount,
        /// Proven amount
        actual: BondAmount,
        /// Which requirement was missed
        reason: String,
    },

    /// The claim has already expired
    #[error("Stale claim: expired at {expires_at}, now {now}")]
    StaleClaim {
        /// Claimed expiry
        expires_at: Timestamp,
        /// Verification time
        now: Timestamp,
    },

    /// The bond already backs a different registry entry
    #[error("Bond {bond} already backs {holder_role} held by {holder}")]
    DuplicateBondUsage {
        /// Contested bond
        bond: LedgerRef,
        /// Node of the entry holding the bond
        holder: NodeId,
        /// Role of the entry holding the bond
        holder_role: RoleType,
    },

    /// No minimum bond is configured for the role
    #[error("Unknown role: {role}")]
    UnknownRole {
        /// Claimed role
        role: RoleType,
    },

    /// Identity or ledger evidence could not be obtained in time
    #[error("Evidence unavailable: {reason}")]
    EvidenceUnavailable {
        /// Which lookup failed and why
        reason: String,
    },

    /// The bond proof describes another output or another holder
    #[error("Bond proof mismatch: claim references {expected}, proof covers {actual}")]
    BondMismatch {
        /// Bond referenced by the claim
        expected: LedgerRef,
        /// Bond described by the proof
        actual: LedgerRef,
    },
}

impl VerificationError {
    pub(crate) fn bad_signature(node_id: NodeId, reason: impl Into<String>) -> Self {
        Self::BadSignature {
            node_id,
            reason: reason.into(),
        }
    }

    pub(crate) fn evidence_unavailable(reason: impl Into<String>) -> Self {
        Self::EvidenceUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether the claim looked forged or malformed, as opposed to merely
    /// unverifiable right now
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::BadSignature { .. } | Self::BondMismatch { .. } | Self::DuplicateBondUsage { .. }
        )
    }
}

/// Why a revocation was not applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevocationError {
    /// Revoker is neither the owner nor an active security manager
    #[error("Unauthorized revocation of {target} by {revoker}")]
    Unauthorized {
        /// Targeted claim
        target: ClaimId,
        /// Issuing node
        revoker: NodeId,
    },

    /// The targeted claim is not in the registry
    #[error("Revocation target not found: {target}")]
    TargetNotFound {
        /// Targeted claim
        target: ClaimId,
    },

    /// The target is already revoked; idempotent replay
    #[error("Claim {target} already revoked at {revoked_at}")]
    AlreadyRevoked {
        /// Targeted claim
        target: ClaimId,
        /// Revocation time on record
        revoked_at: Timestamp,
    },

    /// Revocation signature does not verify
    #[error("Bad revocation signature from {revoker}")]
    BadSignature {
        /// Issuing node
        revoker: NodeId,
    },

    /// Revocation time before the claim became valid or too far in the future
    #[error("Invalid revocation time {revoked_at}: {reason}")]
    InvalidTimestamp {
        /// Claimed revocation time
        revoked_at: Timestamp,
        /// What was wrong
        reason: String,
    },

    /// The target entry is no longer active
    #[error("Revocation target {target} is {status}")]
    TargetInactive {
        /// Targeted claim
        target: ClaimId,
        /// Current status
        status: RoleStatus,
    },
}

impl RevocationError {
    /// Whether this is a harmless replay rather than a rejection
    pub fn is_idempotent_replay(&self) -> bool {
        matches!(self, Self::AlreadyRevoked { .. })
    }
}

/// Outcome of a registry mutation that did not change state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Claim failed verification
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Revocation was refused
    #[error(transparent)]
    Revocation(#[from] RevocationError),

    /// An equal or newer claim already occupies the key
    #[error("Claim {claim_id} superseded: entry for {node_id}/{role} claimed at {current_claimed_at}")]
    Superseded {
        /// Rejected claim
        claim_id: ClaimId,
        /// Key node
        node_id: NodeId,
        /// Key role
        role: RoleType,
        /// Claim time of the entry that stays
        current_claimed_at: Timestamp,
    },

    /// The claim itself, or the key it targets, was revoked
    #[error("Claim {claim_id} refused: {reason}")]
    Revoked {
        /// Rejected claim
        claim_id: ClaimId,
        /// Tombstone or privileged revocation
        reason: String,
    },

    /// The claimant is on the local ban list
    #[error("Node {node_id} is banned")]
    Banned {
        /// Claimant
        node_id: NodeId,
    },
}

impl RegistryError {
    /// Informational outcomes that do not indicate bad input
    pub fn is_informational(&self) -> bool {
        match self {
            Self::Superseded { .. } => true,
            Self::Revocation(err) => err.is_idempotent_replay(),
            _ => false,
        }
    }
}

/// Errors from snapshot bootstrap and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Cancelled between two claim applications
    #[error("Sync cancelled after {applied} applications")]
    Cancelled {
        /// Messages applied before cancellation
        applied: usize,
    },

    /// Persistence collaborator failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] BondedError),
}

/// Result alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
