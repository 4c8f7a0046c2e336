//! Revocation records, tombstones and the expiry schedule
//!
//! The tracker never reaches into the registry. It sees entries by value and
//! learns about security managers through an injected predicate, so it can be
//! driven without holding any registry lock.
//!
//! Tie-break: for one target the earliest valid `revoked_at` is kept. A later
//! or equal revocation is an idempotent replay; an earlier one replaces the
//! record, which makes the final state independent of arrival order.

use crate::authorized::{AuthorizedRole, RegistryKey, RoleStatus};
use crate::error::RevocationError;
use bonded_core::{ClaimId, NodeId, PublicKey, RevocationClaim, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

/// On whose authority a revocation was honored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationAuthority {
    /// The owner withdrew its own claim
    SelfRevocation,
    /// An active security manager revoked someone else's claim
    Privileged,
}

/// An honored revocation, kept as a tombstone after the entry is gone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationRecord {
    /// The signed revocation
    pub claim: RevocationClaim,
    /// Why it was honored
    pub authority: RevocationAuthority,
    /// Registry key of the revoked entry
    pub target_key: RegistryKey,
    /// End of the revoked claim's validity
    pub target_valid_until: Timestamp,
}

impl RevocationRecord {
    /// Effective revocation time
    pub fn revoked_at(&self) -> Timestamp {
        self.claim.revoked_at
    }

    /// Whether the record blocks new claims for the same key
    pub fn is_privileged(&self) -> bool {
        self.authority == RevocationAuthority::Privileged
    }
}

#[derive(Debug, Default)]
struct ExpirySchedule {
    by_time: BTreeSet<(Timestamp, ClaimId)>,
    by_claim: HashMap<ClaimId, Timestamp>,
}

/// Tracks revocations and the expiry/purge schedule of registry entries
#[derive(Debug)]
pub struct RevocationTracker {
    clock_skew_tolerance: Duration,
    max_pending: usize,
    records: Mutex<HashMap<ClaimId, RevocationRecord>>,
    schedule: Mutex<ExpirySchedule>,
    pending: Mutex<VecDeque<RevocationClaim>>,
}

impl RevocationTracker {
    /// Create a tracker
    pub fn new(clock_skew_tolerance: Duration, max_pending: usize) -> Self {
        Self {
            clock_skew_tolerance,
            max_pending,
            records: Mutex::new(HashMap::new()),
            schedule: Mutex::new(ExpirySchedule::default()),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    // ------------------------------------------------------------------------
    // Revocations
    // ------------------------------------------------------------------------

    /// Validate and record a revocation of `entry`
    ///
    /// `is_active_security_manager(node, at)` is only consulted for revocations
    /// not issued by the owner, and is called without any tracker lock held.
    pub fn apply<F>(
        &self,
        revocation: &RevocationClaim,
        entry: &AuthorizedRole,
        revoker_key: &PublicKey,
        now: Timestamp,
        is_active_security_manager: F,
    ) -> Result<RevocationRecord, RevocationError>
    where
        F: FnOnce(&NodeId, Timestamp) -> bool,
    {
        let target = revocation.target_claim_id;
        let revoker = revocation.revoker_node_id;
        if entry.claim_id() != target {
            return Err(RevocationError::TargetNotFound { target });
        }

        revocation
            .verify_signature(revoker_key)
            .map_err(|_| RevocationError::BadSignature { revoker })?;

        let revoked_at = revocation.revoked_at;
        if revoked_at < entry.valid_from() {
            return Err(RevocationError::InvalidTimestamp {
                revoked_at,
                reason: format!("before claim became valid at {}", entry.valid_from()),
            });
        }
        if revoked_at > now.saturating_add(self.clock_skew_tolerance) {
            return Err(RevocationError::InvalidTimestamp {
                revoked_at,
                reason: format!("beyond tolerated clock skew (now {now})"),
            });
        }

        if let Some(existing) = self.revocation_of(&target) {
            if revoked_at >= existing.revoked_at() {
                return Err(RevocationError::AlreadyRevoked {
                    target,
                    revoked_at: existing.revoked_at(),
                });
            }
        } else if entry.status() == RoleStatus::Expired {
            return Err(RevocationError::TargetInactive {
                target,
                status: entry.status(),
            });
        }

        let authority = if revoker == entry.node_id() {
            RevocationAuthority::SelfRevocation
        } else if is_active_security_manager(&revoker, revoked_at) {
            RevocationAuthority::Privileged
        } else {
            return Err(RevocationError::Unauthorized { target, revoker });
        };

        let record = RevocationRecord {
            claim: revocation.clone(),
            authority,
            target_key: entry.key(),
            target_valid_until: entry.valid_until(),
        };

        let mut records = self.records.lock();
        // re-check: a concurrent revocation may have landed meanwhile
        if let Some(existing) = records.get(&target) {
            if revoked_at >= existing.revoked_at() {
                return Err(RevocationError::AlreadyRevoked {
                    target,
                    revoked_at: existing.revoked_at(),
                });
            }
        }
        records.insert(target, record.clone());
        Ok(record)
    }

    /// Whether a revocation for the claim is on record
    pub fn is_revoked(&self, claim_id: &ClaimId) -> bool {
        self.records.lock().contains_key(claim_id)
    }

    /// Revocation on record for the claim
    pub fn revocation_of(&self, claim_id: &ClaimId) -> Option<RevocationRecord> {
        self.records.lock().get(claim_id).cloned()
    }

    /// Whether `entry` is usable at `now`
    pub fn is_valid(&self, entry: &AuthorizedRole, now: Timestamp) -> bool {
        entry.is_valid_at(now)
            && self
                .revocation_of(&entry.claim_id())
                .map_or(true, |record| record.revoked_at() > now)
    }

    /// Drop tombstones whose target is past its purge time
    pub fn prune_tombstones(&self, now: Timestamp, grace: Duration) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.target_valid_until.saturating_add(grace) >= now);
        before - records.len()
    }

    /// Number of revocation records
    pub fn tombstone_count(&self) -> usize {
        self.records.lock().len()
    }

    // ------------------------------------------------------------------------
    // Parked revocations
    // ------------------------------------------------------------------------

    /// Hold a revocation whose target is not known yet, evicting the oldest
    /// when full
    pub fn park(&self, revocation: RevocationClaim) {
        if self.max_pending == 0 {
            return;
        }
        let mut pending = self.pending.lock();
        if pending.contains(&revocation) {
            return;
        }
        while pending.len() >= self.max_pending {
            if let Some(evicted) = pending.pop_front() {
                tracing::debug!(
                    claim_id = %evicted.target_claim_id,
                    "Evicting parked revocation"
                );
            }
        }
        pending.push_back(revocation);
    }

    /// Remove and return every parked revocation for the claim
    pub fn take_pending(&self, claim_id: &ClaimId) -> Vec<RevocationClaim> {
        let mut pending = self.pending.lock();
        let mut taken = Vec::new();
        pending.retain(|revocation| {
            if revocation.target_claim_id == *claim_id {
                taken.push(revocation.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Number of parked revocations
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    // ------------------------------------------------------------------------
    // Expiry schedule
    // ------------------------------------------------------------------------

    /// Track a claim expiring at `valid_until`
    pub fn schedule(&self, claim_id: ClaimId, valid_until: Timestamp) {
        let mut schedule = self.schedule.lock();
        if let Some(previous) = schedule.by_claim.insert(claim_id, valid_until) {
            schedule.by_time.remove(&(previous, claim_id));
        }
        schedule.by_time.insert((valid_until, claim_id));
    }

    /// Stop tracking a claim
    pub fn unschedule(&self, claim_id: &ClaimId) {
        let mut schedule = self.schedule.lock();
        if let Some(at) = schedule.by_claim.remove(claim_id) {
            schedule.by_time.remove(&(at, *claim_id));
        }
    }

    /// Claims whose validity ended before `now`
    pub fn due_expiries(&self, now: Timestamp) -> Vec<ClaimId> {
        self.schedule
            .lock()
            .by_time
            .iter()
            .take_while(|(at, _)| *at < now)
            .map(|(_, claim_id)| *claim_id)
            .collect()
    }

    /// Claims whose grace window ended before `now`
    pub fn due_purges(&self, now: Timestamp, grace: Duration) -> Vec<ClaimId> {
        let cutoff = now.saturating_sub(grace);
        if now.duration_since(Timestamp::ZERO) < grace {
            return Vec::new();
        }
        self.due_expiries(cutoff)
    }

    /// Number of scheduled claims
    pub fn scheduled_len(&self) -> usize {
        self.schedule.lock().by_claim.len()
    }
}
