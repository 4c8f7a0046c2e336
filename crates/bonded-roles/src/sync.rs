//! Snapshot bootstrap and peer reconciliation
//!
//! Nothing a peer or a snapshot says is trusted: every claim and revocation
//! goes back through [`BondedRoleRegistry::submit`] and
//! [`BondedRoleRegistry::revoke`], the same path as live traffic.

use crate::authorized::AuthorizedRole;
use crate::effects::{CancellationToken, IngestOutcome, PersistenceStore, RoleMessage};
use crate::error::SyncError;
use crate::registry::BondedRoleRegistry;
use bonded_core::{
    hasher, BondedError, ClaimId, Hash32, RevocationClaim, RoleClaim, RoleType, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

const DIGEST_DOMAIN: &[u8] = b"bonded/role-digest/v1";

// ============================================================================
// Snapshot
// ============================================================================

/// One registry entry as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The signed claim
    pub claim: RoleClaim,
    /// Revocation on record for the claim, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationClaim>,
}

/// Serializable registry contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub taken_at: Timestamp,
    /// Entries ordered by `(claimed_at, claim_id)`
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Build a snapshot, ordering the entries
    pub fn new(taken_at: Timestamp, mut entries: Vec<SnapshotEntry>) -> Self {
        entries.sort_by_key(|entry| (entry.claim.claimed_at, entry.claim.claim_id));
        Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            entries,
        }
    }

    /// Snapshot without entries
    pub fn empty(taken_at: Timestamp) -> Self {
        Self::new(taken_at, Vec::new())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay order: every claim, then every revocation
    pub fn messages(&self) -> Vec<RoleMessage> {
        let claims = self
            .entries
            .iter()
            .map(|entry| RoleMessage::Claim(entry.claim.clone()));
        let revocations = self
            .entries
            .iter()
            .filter_map(|entry| entry.revocation.clone())
            .map(RoleMessage::Revocation);
        claims.chain(revocations).collect()
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<Vec<u8>, BondedError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON, rejecting unknown versions
    pub fn from_json(bytes: &[u8]) -> Result<Self, BondedError> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BondedError::invalid(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

// ============================================================================
// Digest
// ============================================================================

/// Summary of the active entries of one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDigest {
    /// Number of active entries
    pub count: usize,
    /// Latest claim time among them
    pub max_claimed_at: Timestamp,
    /// Hash of their sorted claim ids
    pub fingerprint: Hash32,
}

impl RoleDigest {
    /// Digest of a set of claim ids
    pub fn from_claims(mut claims: Vec<(ClaimId, Timestamp)>) -> Self {
        claims.sort_unstable();
        let mut h = hasher();
        h.update(DIGEST_DOMAIN);
        for (claim_id, _) in &claims {
            h.update(claim_id.as_bytes());
        }
        Self {
            count: claims.len(),
            max_claimed_at: claims
                .iter()
                .map(|(_, at)| *at)
                .max()
                .unwrap_or(Timestamp::ZERO),
            fingerprint: h.finalize(),
        }
    }

    /// Digest of no entries
    pub fn empty() -> Self {
        Self::from_claims(Vec::new())
    }

    /// Whether this digest is at least as large and as recent as `other`
    ///
    /// Says nothing about set inclusion: only equal fingerprints do.
    pub fn dominates(&self, other: &RoleDigest) -> bool {
        other.count <= self.count && other.max_claimed_at <= self.max_claimed_at
    }
}

/// Per-role summary exchanged with peers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDigest {
    /// Digest of every role with at least one active entry
    pub roles: BTreeMap<RoleType, RoleDigest>,
}

impl RegistryDigest {
    /// Summarize active entries
    pub fn from_active<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a AuthorizedRole>,
    {
        let mut by_role: BTreeMap<RoleType, Vec<(ClaimId, Timestamp)>> = BTreeMap::new();
        for entry in entries {
            by_role
                .entry(entry.role())
                .or_default()
                .push((entry.claim_id(), entry.valid_from()));
        }
        Self {
            roles: by_role
                .into_iter()
                .map(|(role, claims)| (role, RoleDigest::from_claims(claims)))
                .collect(),
        }
    }

    /// Digest for one role
    pub fn get(&self, role: RoleType) -> Option<&RoleDigest> {
        self.roles.get(&role)
    }

    /// Whether no role has active entries
    pub fn is_empty(&self) -> bool {
        self.roles.values().all(|digest| digest.count == 0)
    }

    /// Active entries across all roles
    pub fn total_count(&self) -> usize {
        self.roles.values().map(|digest| digest.count).sum()
    }
}

/// What to ask a peer for after comparing digests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReconcileDecision {
    /// Registries agree, or the peer has nothing new
    NoAction,
    /// Ask for a full snapshot
    RequestFull,
    /// Ask for claims of the listed roles made after the given times
    RequestDelta {
        /// Per diverging role: local `max_claimed_at`, or zero when the
        /// peer's extra claims can only be older than ours
        since: BTreeMap<RoleType, Timestamp>,
    },
}

// ============================================================================
// Coordinator
// ============================================================================

/// Tally of a bootstrap or delta application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Claims that changed the registry
    pub claims_applied: usize,
    /// Revocations that changed the registry or were already on record
    pub revocations_applied: usize,
    /// Superseded claims
    pub ignored: usize,
    /// Refused messages
    pub rejected: usize,
}

impl SyncReport {
    /// Messages processed
    pub fn processed(&self) -> usize {
        self.claims_applied + self.revocations_applied + self.ignored + self.rejected
    }

    fn record(&mut self, kind: &str, outcome: &IngestOutcome) {
        match (kind, outcome) {
            ("claim", IngestOutcome::Applied) => self.claims_applied += 1,
            (_, IngestOutcome::Applied) => self.revocations_applied += 1,
            (_, IngestOutcome::Ignored(_)) => self.ignored += 1,
            (_, IngestOutcome::Rejected(_)) => self.rejected += 1,
        }
    }
}

/// Seeds the registry from snapshots and reconciles against peers
pub struct RegistrySyncCoordinator {
    registry: Arc<BondedRoleRegistry>,
}

impl RegistrySyncCoordinator {
    /// Create a coordinator for a registry
    pub fn new(registry: Arc<BondedRoleRegistry>) -> Self {
        Self { registry }
    }

    /// Registry being synchronized
    pub fn registry(&self) -> &Arc<BondedRoleRegistry> {
        &self.registry
    }

    /// Replay a snapshot: all claims first, then all revocations
    ///
    /// Cancellation is checked before each message; on cancellation the
    /// messages applied so far stay applied.
    pub async fn bootstrap(
        &self,
        snapshot: Snapshot,
        cancel: &dyn CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let messages = snapshot.messages();
        let report = self.apply_messages(messages, cancel).await?;
        tracing::info!(
            entries = snapshot.len(),
            claims_applied = report.claims_applied,
            revocations_applied = report.revocations_applied,
            rejected = report.rejected,
            "Registry bootstrapped from snapshot"
        );
        Ok(report)
    }

    /// Load the stored snapshot and replay it; empty report if none is stored
    pub async fn bootstrap_from_store(
        &self,
        store: &dyn PersistenceStore,
        cancel: &dyn CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        match store.load().await? {
            Some(snapshot) => self.bootstrap(snapshot, cancel).await,
            None => {
                tracing::info!("No stored registry snapshot");
                Ok(SyncReport::default())
            }
        }
    }

    /// Decide what to request from a peer given its digest
    pub fn reconcile(&self, peer: &RegistryDigest) -> ReconcileDecision {
        let local = self.registry.digest();
        if peer.is_empty() {
            return ReconcileDecision::NoAction;
        }
        if local.is_empty() {
            return ReconcileDecision::RequestFull;
        }

        let empty = RoleDigest::empty();
        let mut since = BTreeMap::new();
        for (role, theirs) in &peer.roles {
            let ours = local.get(*role).unwrap_or(&empty);
            if ours.fingerprint == theirs.fingerprint {
                continue;
            }
            // a differing fingerprint means the peer may hold claims we lack;
            // when they cannot be newer than ours they can only be older
            let after = if ours.dominates(theirs) {
                Timestamp::ZERO
            } else {
                ours.max_claimed_at
            };
            since.insert(*role, after);
        }

        let decision = if since.len() > self.registry.config().full_sync_role_threshold {
            ReconcileDecision::RequestFull
        } else if since.is_empty() {
            ReconcileDecision::NoAction
        } else {
            ReconcileDecision::RequestDelta { since }
        };
        tracing::debug!(?decision, "Reconciled against peer digest");
        decision
    }

    /// Apply messages received from a peer, claims before revocations
    pub async fn apply_delta(
        &self,
        messages: Vec<RoleMessage>,
        cancel: &dyn CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let (claims, revocations): (Vec<_>, Vec<_>) = messages
            .into_iter()
            .partition(|message| matches!(message, RoleMessage::Claim(_)));
        let report = self
            .apply_messages(claims.into_iter().chain(revocations).collect(), cancel)
            .await?;
        tracing::debug!(
            processed = report.processed(),
            rejected = report.rejected,
            "Applied peer delta"
        );
        Ok(report)
    }

    async fn apply_messages(
        &self,
        messages: Vec<RoleMessage>,
        cancel: &dyn CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        for message in messages {
            if cancel.is_cancelled() {
                tracing::info!(applied = report.processed(), "Registry sync cancelled");
                return Err(SyncError::Cancelled {
                    applied: report.processed(),
                });
            }
            let kind = message.kind();
            let result = match message {
                RoleMessage::Claim(claim) => self.registry.submit(claim).await,
                RoleMessage::Revocation(revocation) => self.registry.revoke(revocation).await,
            };
            let outcome = IngestOutcome::from_result(result);
            if let IngestOutcome::Rejected(err) = &outcome {
                tracing::debug!(kind, error = %err, "Sync message rejected");
            }
            report.record(kind, &outcome);
        }
        Ok(report)
    }
}
