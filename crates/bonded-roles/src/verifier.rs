//! Role claim verification
//!
//! [`ProofVerifier::verify`] is pure: it looks only at the claim, at evidence
//! gathered beforehand and at the current bond holder. The async half,
//! [`ProofVerifier::gather_evidence`], talks to the identity and ledger
//! collaborators under a bounded timeout so a slow ledger cannot stall the
//! registry.

use crate::authorized::{AuthorizedRole, RegistryKey};
use crate::config::RegistryConfig;
use crate::effects::{BondLedger, IdentityService};
use crate::error::VerificationError;
use bonded_core::{BondProof, BondedError, NodeId, PublicKey, RoleClaim, Timestamp};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Evidence for one claim, gathered before verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimEvidence {
    /// Claimant's key as reported by the identity service
    pub public_key: PublicKey,
    /// Ledger view of the referenced bond
    pub bond_proof: BondProof,
}

/// Validates role claims against signatures and bond evidence
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    config: Arc<RegistryConfig>,
}

impl ProofVerifier {
    /// Create a verifier for a configuration
    pub fn new(config: Arc<RegistryConfig>) -> Self {
        Self { config }
    }

    /// Check a claim and derive its authorized role
    ///
    /// `bond_holder` is the registry key currently holding the claim's bond, if
    /// any. Checks run in a fixed order and the first failure is returned.
    pub fn verify(
        &self,
        claim: &RoleClaim,
        evidence: &ClaimEvidence,
        now: Timestamp,
        bond_holder: Option<RegistryKey>,
    ) -> Result<AuthorizedRole, VerificationError> {
        let node_id = claim.node_id;

        if !claim.has_consistent_id() {
            return Err(VerificationError::bad_signature(
                node_id,
                "claim id does not match claim contents",
            ));
        }

        let required = self
            .config
            .min_bond(claim.role)
            .ok_or(VerificationError::UnknownRole { role: claim.role })?;

        let latest_acceptable = now.saturating_add(self.config.clock_skew_tolerance());
        if claim.claimed_at > latest_acceptable {
            return Err(VerificationError::bad_signature(
                node_id,
                format!(
                    "claimed at {} beyond tolerated clock skew (now {now})",
                    claim.claimed_at
                ),
            ));
        }

        if claim.expires_at <= claim.claimed_at {
            return Err(VerificationError::bad_signature(
                node_id,
                "claim expires before it was made",
            ));
        }

        // A claim is stale once its clamped lifetime is over, whatever it says
        // about its own expiry.
        let effective_expiry = claim
            .expires_at
            .min(claim.claimed_at.saturating_add(self.config.max_claim_lifetime()));
        if effective_expiry <= now {
            return Err(VerificationError::StaleClaim {
                expires_at: effective_expiry,
                now,
            });
        }

        claim
            .verify_signature(&evidence.public_key)
            .map_err(|e| VerificationError::bad_signature(node_id, e.to_string()))?;

        let proof = &evidence.bond_proof;
        if !proof.matches(&claim.bond_tx_ref, &node_id) {
            return Err(VerificationError::BondMismatch {
                expected: claim.bond_tx_ref,
                actual: proof.bond_tx_ref,
            });
        }

        if proof.amount < required {
            return Err(VerificationError::InsufficientBond {
                role: claim.role,
                required,
                actual: proof.amount,
                reason: "amount below role minimum".to_string(),
            });
        }
        if proof.confirmations < self.config.min_confirmations {
            return Err(VerificationError::InsufficientBond {
                role: claim.role,
                required,
                actual: proof.amount,
                reason: format!(
                    "{} confirmations, {} required",
                    proof.confirmations, self.config.min_confirmations
                ),
            });
        }

        let key = RegistryKey::new(node_id, claim.role);
        if let Some(holder) = bond_holder.filter(|holder| *holder != key) {
            return Err(VerificationError::DuplicateBondUsage {
                bond: claim.bond_tx_ref,
                holder: holder.node_id,
                holder_role: holder.role,
            });
        }

        tracing::debug!(
            claim_id = %claim.claim_id,
            node_id = %node_id,
            role = %claim.role,
            "Role claim verified"
        );

        Ok(AuthorizedRole::from_verified(
            claim,
            self.config.max_claim_lifetime(),
        ))
    }

    /// Resolve the claimant's key and the bond proof, each bounded by the
    /// evidence timeout
    pub async fn gather_evidence(
        &self,
        claim: &RoleClaim,
        identity: &dyn IdentityService,
        ledger: &dyn BondLedger,
    ) -> Result<ClaimEvidence, VerificationError> {
        let (public_key, bond_proof) = tokio::join!(
            self.bounded("public key", identity.resolve_public_key(&claim.node_id)),
            self.bounded("bond proof", ledger.bond_proof(&claim.bond_tx_ref)),
        );
        Ok(ClaimEvidence {
            public_key: public_key?,
            bond_proof: bond_proof?,
        })
    }

    /// Resolve a single node key under the evidence timeout
    pub async fn resolve_public_key(
        &self,
        node_id: &NodeId,
        identity: &dyn IdentityService,
    ) -> Result<PublicKey, VerificationError> {
        self.bounded("public key", identity.resolve_public_key(node_id))
            .await
    }

    /// Evidence timeout in effect
    pub fn evidence_timeout(&self) -> Duration {
        self.config.evidence_timeout()
    }

    async fn bounded<T, F>(&self, what: &str, lookup: F) -> Result<T, VerificationError>
    where
        F: Future<Output = Result<T, BondedError>>,
    {
        let timeout = self.config.evidence_timeout();
        match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_not_found() => Err(VerificationError::evidence_unavailable(
                format!("{what} not found: {err}"),
            )),
            Ok(Err(err)) => {
                tracing::warn!(lookup = what, error = %err, "Evidence lookup failed");
                Err(VerificationError::evidence_unavailable(format!(
                    "{what} lookup failed: {err}"
                )))
            }
            Err(_) => {
                tracing::warn!(
                    lookup = what,
                    timeout_ms = timeout.as_millis() as u64,
                    "Evidence lookup timed out"
                );
                Err(VerificationError::evidence_unavailable(format!(
                    "{what} lookup timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}
