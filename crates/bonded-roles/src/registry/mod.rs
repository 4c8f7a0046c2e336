//! Bonded role registry
//!
//! The authoritative, concurrently accessed store of authorized roles, keyed
//! by `(node, role)`.
//!
//! # Locking
//!
//! Every key has its own slot lock, which serializes writers of that key. The
//! key map lock is only held to find or insert a slot, never while waiting on
//! a slot; the one exception is purge, which removes a slot from the map while
//! holding it and marks it retired so that writers who raced past the map
//! retry with a fresh slot. Bond reservations, the claim index, the ban list
//! and the revocation tracker are leaf locks. No lock is held across an
//! `.await`.

mod events;
mod slot;
mod view;

pub use events::{RegistryEvent, TickReport};
pub use view::RoleView;

use crate::authorized::{AuthorizedRole, RegistryKey, RoleStatus};
use crate::config::RegistryConfig;
use crate::effects::{
    BondLedger, Clock, IdentityService, IngestOutcome, RoleMessage, RoleMessageHandler,
};
use crate::error::{RegistryError, RegistryResult, RevocationError, VerificationError};
use crate::revocation::{RevocationRecord, RevocationTracker};
use crate::sync::{RegistryDigest, Snapshot, SnapshotEntry};
use crate::verifier::ProofVerifier;
use async_trait::async_trait;
use bonded_core::{ClaimId, LedgerRef, NodeId, RevocationClaim, RoleClaim, RoleType, Timestamp};
use parking_lot::{Mutex, RwLock};
use slot::{KeySlot, RegistryEntry, SlotState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Concurrent store of authorized bonded roles
pub struct BondedRoleRegistry {
    config: Arc<RegistryConfig>,
    verifier: ProofVerifier,
    tracker: RevocationTracker,
    identity: Arc<dyn IdentityService>,
    ledger: Arc<dyn BondLedger>,
    clock: Arc<dyn Clock>,
    slots: RwLock<HashMap<RegistryKey, Arc<KeySlot>>>,
    claims: RwLock<HashMap<ClaimId, RegistryKey>>,
    /// Bonds consumed by Active entries, and by Revoked ones unless
    /// `release_bond_on_revocation` is set
    bonds: Mutex<HashMap<LedgerRef, RegistryKey>>,
    banned: RwLock<HashSet<NodeId>>,
    events: broadcast::Sender<RegistryEvent>,
    tick_lock: Mutex<()>,
}

impl BondedRoleRegistry {
    /// Create an empty registry
    pub fn new(
        config: RegistryConfig,
        identity: Arc<dyn IdentityService>,
        ledger: Arc<dyn BondLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            verifier: ProofVerifier::new(config.clone()),
            tracker: RevocationTracker::new(
                config.clock_skew_tolerance(),
                config.max_pending_revocations,
            ),
            config,
            identity,
            ledger,
            clock,
            slots: RwLock::new(HashMap::new()),
            claims: RwLock::new(HashMap::new()),
            bonds: Mutex::new(HashMap::new()),
            banned: RwLock::new(HashSet::new()),
            events,
            tick_lock: Mutex::new(()),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current time according to the registry clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Subscribe to registry change events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Verify a role claim and make it the entry for its key
    ///
    /// Re-submitting the current claim, or any claim not strictly newer than
    /// the current one, yields [`RegistryError::Superseded`] and changes
    /// nothing.
    pub async fn submit(&self, claim: RoleClaim) -> RegistryResult<()> {
        let key = RegistryKey::new(claim.node_id, claim.role);

        if self.is_banned(&claim.node_id) {
            tracing::warn!(
                node_id = %claim.node_id,
                role = %claim.role,
                "Rejecting claim from banned node"
            );
            return Err(RegistryError::Banned {
                node_id: claim.node_id,
            });
        }

        if claim.has_consistent_id() && self.tracker.is_revoked(&claim.claim_id) {
            tracing::debug!(claim_id = %claim.claim_id, "Refusing replay of revoked claim");
            return Err(RegistryError::Revoked {
                claim_id: claim.claim_id,
                reason: "claim was revoked".to_string(),
            });
        }

        // cheap pre-check before touching the collaborators; repeated under
        // the key lock
        let current = self.slot(&key).and_then(|slot| slot.entry());
        if let Some(current) = current {
            self.check_replaceable(&claim, &current)?;
        }

        let evidence = self
            .verifier
            .gather_evidence(&claim, self.identity.as_ref(), self.ledger.as_ref())
            .await
            .map_err(|err| self.claim_rejected(&claim, err))?;

        let now = self.clock.now();
        let bond_holder = self.bonds.lock().get(&claim.bond_tx_ref).copied();
        let authorized = self
            .verifier
            .verify(&claim, &evidence, now, bond_holder)
            .map_err(|err| self.claim_rejected(&claim, err))?;

        let claim_id = claim.claim_id;
        self.install(claim, authorized)?;

        for revocation in self.tracker.take_pending(&claim_id) {
            if let Err(err) = self.revoke(revocation).await {
                tracing::debug!(claim_id = %claim_id, error = %err, "Parked revocation not applied");
            }
        }
        Ok(())
    }

    fn install(&self, claim: RoleClaim, authorized: AuthorizedRole) -> RegistryResult<()> {
        let key = authorized.key();
        let mut events = Vec::new();
        let result = loop {
            let slot = self.slot_or_insert(&key);
            let mut state = slot.state.write();
            if state.retired {
                continue;
            }
            let result = self.install_locked(&key, &mut state, claim, authorized, &mut events);
            if result.is_err() && state.entry.is_none() {
                self.retire_locked(&key, &slot, &mut state);
            }
            break result;
        };
        self.emit(events);
        result
    }

    fn install_locked(
        &self,
        key: &RegistryKey,
        state: &mut SlotState,
        claim: RoleClaim,
        authorized: AuthorizedRole,
        events: &mut Vec<RegistryEvent>,
    ) -> RegistryResult<()> {
        if let Some(current) = state.entry.as_ref() {
            self.check_replaceable(&claim, current)?;
        }

        {
            let mut bonds = self.bonds.lock();
            if let Some(holder) = bonds.get(&claim.bond_tx_ref).filter(|holder| *holder != key) {
                let err = VerificationError::DuplicateBondUsage {
                    bond: claim.bond_tx_ref,
                    holder: holder.node_id,
                    holder_role: holder.role,
                };
                drop(bonds);
                return Err(self.claim_rejected(&claim, err));
            }
            if let Some(current) = state.entry.as_ref() {
                let old_bond = current.claim.bond_tx_ref;
                if old_bond != claim.bond_tx_ref && bonds.get(&old_bond) == Some(key) {
                    bonds.remove(&old_bond);
                }
            }
            bonds.insert(claim.bond_tx_ref, *key);
        }

        let claim_id = claim.claim_id;
        let valid_until = authorized.valid_until();
        let previous = state.entry.replace(RegistryEntry {
            role: authorized.clone(),
            claim,
        });

        {
            let mut claims = self.claims.write();
            if let Some(previous) = &previous {
                claims.remove(&previous.role.claim_id());
            }
            claims.insert(claim_id, *key);
        }

        if let Some(previous) = previous {
            let previous_id = previous.role.claim_id();
            self.tracker.unschedule(&previous_id);
            tracing::debug!(
                node_id = %key.node_id,
                role = %key.role,
                previous = %previous_id,
                claim_id = %claim_id,
                "Role claim superseded"
            );
            events.push(RegistryEvent::Superseded {
                key: *key,
                previous: previous_id,
                by: claim_id,
            });
        }
        self.tracker.schedule(claim_id, valid_until);

        tracing::info!(
            node_id = %key.node_id,
            role = %key.role,
            claim_id = %claim_id,
            valid_until = %valid_until,
            "Bonded role activated"
        );
        events.push(RegistryEvent::Activated { role: authorized });
        Ok(())
    }

    fn check_replaceable(&self, claim: &RoleClaim, current: &RegistryEntry) -> RegistryResult<()> {
        if claim.claimed_at <= current.claim.claimed_at {
            tracing::debug!(
                claim_id = %claim.claim_id,
                current = %current.role.claim_id(),
                "Claim not newer than current entry"
            );
            return Err(RegistryError::Superseded {
                claim_id: claim.claim_id,
                node_id: claim.node_id,
                role: claim.role,
                current_claimed_at: current.claim.claimed_at,
            });
        }

        if current.role.status() == RoleStatus::Revoked {
            let privileged = self
                .tracker
                .revocation_of(&current.role.claim_id())
                .is_some_and(|record| record.is_privileged());
            if privileged {
                return Err(RegistryError::Revoked {
                    claim_id: claim.claim_id,
                    reason: format!(
                        "{} revoked by a security manager until purged",
                        current.role.key()
                    ),
                });
            }
        }
        Ok(())
    }

    fn claim_rejected(&self, claim: &RoleClaim, err: VerificationError) -> RegistryError {
        if err.is_suspicious() {
            tracing::warn!(
                claim_id = %claim.claim_id,
                node_id = %claim.node_id,
                role = %claim.role,
                error = %err,
                "Rejected suspicious role claim"
            );
        } else if matches!(err, VerificationError::EvidenceUnavailable { .. }) {
            tracing::warn!(
                claim_id = %claim.claim_id,
                node_id = %claim.node_id,
                error = %err,
                "Evidence unavailable for role claim"
            );
        } else {
            tracing::debug!(
                claim_id = %claim.claim_id,
                node_id = %claim.node_id,
                role = %claim.role,
                error = %err,
                "Role claim rejected"
            );
        }
        err.into()
    }

    // ========================================================================
    // Revocations
    // ========================================================================

    /// Apply a revocation
    ///
    /// Replays of an already recorded revocation succeed without changing
    /// anything. Revocations for claims not seen yet are parked and replayed
    /// when the claim arrives.
    pub async fn revoke(&self, revocation: RevocationClaim) -> RegistryResult<()> {
        let target = revocation.target_claim_id;
        let key = self.claims.read().get(&target).copied();
        let Some(key) = key else {
            return self.revoke_unknown(revocation);
        };

        let revoker_key = self
            .verifier
            .resolve_public_key(&revocation.revoker_node_id, self.identity.as_ref())
            .await?;

        // checked before taking the slot lock so that no writer holds two
        // slot locks at once
        let privileged = revocation.revoker_node_id != key.node_id
            && self.is_active_security_manager(&revocation.revoker_node_id, revocation.revoked_at);

        let Some(slot) = self.slot(&key) else {
            return self.revoke_unknown(revocation);
        };
        let now = self.clock.now();
        let mut events = Vec::new();
        let applied = {
            let mut guard = slot.state.write();
            let state: &mut SlotState = &mut guard;
            let entry = state
                .entry
                .as_ref()
                .filter(|entry| entry.role.claim_id() == target)
                .map(|entry| entry.role.clone());
            match entry {
                Some(entry) if !state.retired => {
                    let applied =
                        self.tracker
                            .apply(&revocation, &entry, &revoker_key, now, |_, _| privileged);
                    if let Ok(record) = &applied {
                        self.mark_revoked_locked(&key, &slot, state, record, &mut events);
                    }
                    Some(applied)
                }
                _ => None,
            }
        };
        self.emit(events);

        let Some(applied) = applied else {
            // superseded or purged while the key was being resolved
            return self.revoke_unknown(revocation);
        };
        match applied {
            Ok(_) => Ok(()),
            Err(err) if err.is_idempotent_replay() => {
                tracing::debug!(claim_id = %target, "Revocation already on record");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    claim_id = %target,
                    revoker = %revocation.revoker_node_id,
                    error = %err,
                    "Revocation refused"
                );
                Err(err.into())
            }
        }
    }

    fn revoke_unknown(&self, revocation: RevocationClaim) -> RegistryResult<()> {
        let target = revocation.target_claim_id;
        if let Some(record) = self.tracker.revocation_of(&target) {
            if revocation.revoked_at >= record.revoked_at() {
                tracing::debug!(claim_id = %target, "Revocation of purged claim already on record");
                return Ok(());
            }
        }
        tracing::debug!(claim_id = %target, "Parking revocation for unknown claim");
        self.tracker.park(revocation);
        Err(RevocationError::TargetNotFound { target }.into())
    }

    /// Flip the entry to Revoked. Caller holds the slot's write lock and has
    /// just recorded `record` against the entry's current status.
    fn mark_revoked_locked(
        &self,
        key: &RegistryKey,
        slot: &Arc<KeySlot>,
        state: &mut SlotState,
        record: &RevocationRecord,
        events: &mut Vec<RegistryEvent>,
    ) {
        let target = record.claim.target_claim_id;
        let Some(entry) = state.entry.as_mut() else {
            return;
        };
        if entry.role.status() == RoleStatus::Expired {
            return;
        }
        entry.role = entry.role.with_status(RoleStatus::Revoked);
        if self.config.release_bond_on_revocation {
            self.release_bond(key, &entry.claim.bond_tx_ref);
        }

        tracing::info!(
            node_id = %key.node_id,
            role = %key.role,
            claim_id = %target,
            revoker = %record.claim.revoker_node_id,
            revoked_at = %record.revoked_at(),
            authority = ?record.authority,
            "Bonded role revoked"
        );
        events.push(RegistryEvent::Revoked {
            key: *key,
            claim_id: target,
            revoker: record.claim.revoker_node_id,
            revoked_at: record.revoked_at(),
            authority: record.authority,
        });

        if self.config.purge_on_revoke {
            self.purge_locked(key, slot, state, events);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Entry for a key, in whatever state it is
    pub fn query(&self, node_id: &NodeId, role: RoleType) -> Option<AuthorizedRole> {
        self.slot(&RegistryKey::new(*node_id, role))
            .and_then(|slot| slot.role())
    }

    /// Point-in-time view of every entry holding `role`
    pub fn query_by_role(&self, role: RoleType) -> RoleView {
        let slots: Vec<Arc<KeySlot>> = self
            .slots
            .read()
            .iter()
            .filter(|(key, _)| key.role == role)
            .map(|(_, slot)| slot.clone())
            .collect();
        let entries = slots.iter().filter_map(|slot| slot.role()).collect();
        RoleView::new(role, self.clock.now(), entries)
    }

    /// Entries of `role` usable right now, excluding banned nodes
    pub fn active_by_role(&self, role: RoleType) -> Vec<AuthorizedRole> {
        let now = self.clock.now();
        self.query_by_role(role)
            .filter(|entry| self.tracker.is_valid(entry, now) && !self.is_banned(&entry.node_id()))
            .collect()
    }

    /// Whether `node_id` held a security manager role at `at`
    pub fn is_active_security_manager(&self, node_id: &NodeId, at: Timestamp) -> bool {
        let Some(role) = self.query(node_id, RoleType::SecurityManager) else {
            return false;
        };
        if at < role.valid_from() || at >= role.valid_until() {
            return false;
        }
        match role.status() {
            RoleStatus::Revoked => self
                .tracker
                .revocation_of(&role.claim_id())
                .is_some_and(|record| record.revoked_at() > at),
            RoleStatus::Active | RoleStatus::Expired => true,
        }
    }

    /// Revocation on record for a claim, including purged claims
    pub fn revocation_of(&self, claim_id: &ClaimId) -> Option<RevocationRecord> {
        self.tracker.revocation_of(claim_id)
    }

    /// Revocations waiting for their target claim
    pub fn pending_revocations(&self) -> usize {
        self.tracker.pending_len()
    }

    /// Number of entries in any state
    pub fn len(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.state.read().entry.is_some())
            .count()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializable copy of every entry and its revocation
    pub fn snapshot(&self) -> Snapshot {
        let entries = self
            .entries()
            .into_iter()
            .map(|entry| SnapshotEntry {
                revocation: self
                    .tracker
                    .revocation_of(&entry.role.claim_id())
                    .map(|record| record.claim),
                claim: entry.claim,
            })
            .collect();
        Snapshot::new(self.clock.now(), entries)
    }

    /// Per-role summary of active entries for reconciliation
    pub fn digest(&self) -> RegistryDigest {
        RegistryDigest::from_active(
            self.entries()
                .iter()
                .map(|entry| &entry.role)
                .filter(|role| role.status() == RoleStatus::Active),
        )
    }

    // ========================================================================
    // Ban list
    // ========================================================================

    /// Refuse further claims from a node; returns false if already banned
    pub fn ban_node(&self, node_id: NodeId) -> bool {
        let added = self.banned.write().insert(node_id);
        if added {
            tracing::warn!(node_id = %node_id, "Node banned");
        }
        added
    }

    /// Lift a ban; returns false if the node was not banned
    pub fn unban_node(&self, node_id: &NodeId) -> bool {
        let removed = self.banned.write().remove(node_id);
        if removed {
            tracing::info!(node_id = %node_id, "Node unbanned");
        }
        removed
    }

    /// Whether a node is banned
    pub fn is_banned(&self, node_id: &NodeId) -> bool {
        self.banned.read().contains(node_id)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Expire and purge entries due at `now`
    ///
    /// Serialized against itself; safe to run concurrently with submissions
    /// and revocations.
    pub fn tick(&self, now: Timestamp) -> TickReport {
        let _guard = self.tick_lock.lock();
        let grace = self.config.grace_window();
        let mut report = TickReport::default();
        let mut events = Vec::new();

        for claim_id in self.tracker.due_expiries(now) {
            let Some((key, slot)) = self.locate(&claim_id) else {
                self.tracker.unschedule(&claim_id);
                continue;
            };
            let mut state = slot.state.write();
            let due = state.entry.as_mut().filter(|entry| {
                entry.role.claim_id() == claim_id
                    && entry.role.status() == RoleStatus::Active
                    && entry.role.valid_until() < now
            });
            if let Some(entry) = due {
                entry.role = entry.role.with_status(RoleStatus::Expired);
                // an expired entry no longer consumes its bond
                self.release_bond(&key, &entry.claim.bond_tx_ref);
                tracing::debug!(node_id = %key.node_id, role = %key.role, claim_id = %claim_id, "Bonded role expired");
                events.push(RegistryEvent::Expired { key, claim_id });
                report.expired.push(claim_id);
            }
        }

        for claim_id in self.tracker.due_purges(now, grace) {
            let Some((key, slot)) = self.locate(&claim_id) else {
                self.tracker.unschedule(&claim_id);
                continue;
            };
            let mut state = slot.state.write();
            let current = state
                .entry
                .as_ref()
                .is_some_and(|entry| entry.role.claim_id() == claim_id);
            if current {
                if let Some(purged) = self.purge_locked(&key, &slot, &mut state, &mut events) {
                    report.purged.push(purged);
                }
            }
        }

        report.tombstones_pruned = self.tracker.prune_tombstones(now, grace);
        self.emit(events);

        if !report.is_empty() {
            tracing::info!(
                expired = report.expired.len(),
                purged = report.purged.len(),
                tombstones_pruned = report.tombstones_pruned,
                now = %now,
                "Registry maintenance tick"
            );
        }
        report
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn slot(&self, key: &RegistryKey) -> Option<Arc<KeySlot>> {
        self.slots.read().get(key).cloned()
    }

    fn slot_or_insert(&self, key: &RegistryKey) -> Arc<KeySlot> {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        self.slots.write().entry(*key).or_default().clone()
    }

    fn slots(&self) -> Vec<Arc<KeySlot>> {
        self.slots.read().values().cloned().collect()
    }

    fn entries(&self) -> Vec<RegistryEntry> {
        self.slots()
            .iter()
            .filter_map(|slot| slot.entry())
            .collect()
    }

    fn locate(&self, claim_id: &ClaimId) -> Option<(RegistryKey, Arc<KeySlot>)> {
        let key = self.claims.read().get(claim_id).copied()?;
        let slot = self.slot(&key)?;
        Some((key, slot))
    }

    fn release_bond(&self, key: &RegistryKey, bond: &LedgerRef) {
        let mut bonds = self.bonds.lock();
        if bonds.get(bond) == Some(key) {
            bonds.remove(bond);
        }
    }

    /// Remove the slot from the key map. Caller holds the slot's write lock.
    fn retire_locked(&self, key: &RegistryKey, slot: &Arc<KeySlot>, state: &mut SlotState) {
        state.retired = true;
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }

    fn purge_locked(
        &self,
        key: &RegistryKey,
        slot: &Arc<KeySlot>,
        state: &mut SlotState,
        events: &mut Vec<RegistryEvent>,
    ) -> Option<ClaimId> {
        let entry = state.entry.take()?;
        let claim_id = entry.role.claim_id();
        self.claims.write().remove(&claim_id);
        self.release_bond(key, &entry.claim.bond_tx_ref);
        self.tracker.unschedule(&claim_id);
        self.retire_locked(key, slot, state);

        tracing::info!(
            node_id = %key.node_id,
            role = %key.role,
            claim_id = %claim_id,
            status = %entry.role.status(),
            "Bonded role purged"
        );
        events.push(RegistryEvent::Purged {
            key: *key,
            claim_id,
        });
        Some(claim_id)
    }

    fn emit(&self, events: Vec<RegistryEvent>) {
        for event in events {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl RoleMessageHandler for BondedRoleRegistry {
    async fn on_message(&self, message: RoleMessage) -> IngestOutcome {
        let kind = message.kind();
        let result = match message {
            RoleMessage::Claim(claim) => self.submit(claim).await,
            RoleMessage::Revocation(revocation) => self.revoke(revocation).await,
        };
        let outcome = IngestOutcome::from_result(result);
        if let IngestOutcome::Rejected(err) = &outcome {
            tracing::debug!(kind, error = %err, "Role message rejected");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bonded_core::{hash, BondAmount, BondProof, BondedError, PublicKey, SigningKey};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Keys(HashMap<NodeId, PublicKey>);

    #[async_trait]
    impl IdentityService for Keys {
        async fn resolve_public_key(&self, node_id: &NodeId) -> Result<PublicKey, BondedError> {
            self.0
                .get(node_id)
                .copied()
                .ok_or_else(|| BondedError::not_found(node_id.to_string()))
        }
    }

    struct Bonds(HashMap<LedgerRef, BondProof>);

    #[async_trait]
    impl BondLedger for Bonds {
        async fn bond_proof(&self, bond: &LedgerRef) -> Result<BondProof, BondedError> {
            self.0
                .get(bond)
                .cloned()
                .ok_or_else(|| BondedError::not_found(bond.to_string()))
        }
    }

    struct Fixed(AtomicU64);

    impl Clock for Fixed {
        fn now(&self) -> Timestamp {
            Timestamp(self.0.load(Ordering::SeqCst))
        }
    }

    struct Harness {
        registry: BondedRoleRegistry,
        clock: Arc<Fixed>,
        signers: Vec<SigningKey>,
    }

    impl Harness {
        fn new(config: RegistryConfig) -> Self {
            let signers: Vec<SigningKey> = (1..=3u8).map(|seed| SigningKey::from_bytes(&[seed; 32])).collect();
            let mut keys = HashMap::new();
            let mut proofs = HashMap::new();
            for (i, signer) in signers.iter().enumerate() {
                let node = NodeId::from_public_key(&signer.verifying_key());
                keys.insert(node, signer.verifying_key());
                for output in 0..3u32 {
                    let bond = bond_of(i, output);
                    proofs.insert(bond, BondProof::new(bond, node, BondAmount::new(u64::MAX), 6));
                }
            }
            let clock = Arc::new(Fixed(AtomicU64::new(150)));
            let registry = BondedRoleRegistry::new(
                config,
                Arc::new(Keys(keys)),
                Arc::new(Bonds(proofs)),
                clock.clone(),
            );
            Self { registry, clock, signers }
        }

        fn node(&self, i: usize) -> NodeId {
            NodeId::from_public_key(&self.signers[i].verifying_key())
        }

        fn claim(&self, i: usize, role: RoleType, output: u32, claimed_at: u64, expires_at: u64) -> RoleClaim {
            RoleClaim::sign(
                &self.signers[i],
                self.node(i),
                role,
                bond_of(i, output),
                Timestamp(claimed_at),
                Timestamp(expires_at),
            )
        }

        fn revocation(&self, by: usize, target: ClaimId, at: u64) -> RevocationClaim {
            RevocationClaim::sign(&self.signers[by], target, self.node(by), Timestamp(at))
        }
    }

    fn bond_of(node: usize, output: u32) -> LedgerRef {
        LedgerRef::new(hash(format!("bond-{node}").as_bytes()), output)
    }

    #[tokio::test]
    async fn test_submit_query_and_replay() {
        let h = Harness::new(RegistryConfig::default());
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim.clone()).await.unwrap();

        let role = h.registry.query(&h.node(0), RoleType::Mediator).unwrap();
        assert_eq!(role.status(), RoleStatus::Active);
        assert_eq!(h.registry.len(), 1);

        assert_matches!(
            h.registry.submit(claim).await,
            Err(RegistryError::Superseded { .. })
        );
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_newer_claim_supersedes_and_moves_bond() {
        let h = Harness::new(RegistryConfig::default());
        let old = h.claim(0, RoleType::Mediator, 0, 100, 500);
        let new = h.claim(0, RoleType::Mediator, 1, 120, 500);
        h.registry.submit(old).await.unwrap();
        h.registry.submit(new.clone()).await.unwrap();

        let role = h.registry.query(&h.node(0), RoleType::Mediator).unwrap();
        assert_eq!(role.claim_id(), new.claim_id);

        // the first bond is free again
        h.registry
            .submit(h.claim(0, RoleType::Arbitrator, 0, 130, 500))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_revocation_marks_entry_and_blocks_replay() {
        let h = Harness::new(RegistryConfig::default());
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim.clone()).await.unwrap();

        h.registry
            .revoke(h.revocation(0, claim.claim_id, 150))
            .await
            .unwrap();
        let role = h.registry.query(&h.node(0), RoleType::Mediator).unwrap();
        assert_eq!(role.status(), RoleStatus::Revoked);
        assert!(h.registry.active_by_role(RoleType::Mediator).is_empty());

        assert_matches!(
            h.registry.submit(claim).await,
            Err(RegistryError::Revoked { .. })
        );
    }

    #[tokio::test]
    async fn test_purge_on_revoke_releases_key() {
        let config = RegistryConfig {
            purge_on_revoke: true,
            ..RegistryConfig::default()
        };
        let h = Harness::new(config);
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim.clone()).await.unwrap();
        h.registry
            .revoke(h.revocation(0, claim.claim_id, 150))
            .await
            .unwrap();

        assert!(h.registry.query(&h.node(0), RoleType::Mediator).is_none());
        assert!(h.registry.revocation_of(&claim.claim_id).is_some());
        // replaying the revocation against the tombstone is harmless
        h.registry
            .revoke(h.revocation(0, claim.claim_id, 150))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tick_expires_then_purges() {
        let h = Harness::new(RegistryConfig {
            grace_window_ms: 100,
            ..RegistryConfig::default()
        });
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim.clone()).await.unwrap();

        let report = h.registry.tick(Timestamp(250));
        assert_eq!(report.expired, vec![claim.claim_id]);
        assert_eq!(
            h.registry.query(&h.node(0), RoleType::Mediator).map(|r| r.status()),
            Some(RoleStatus::Expired)
        );
        assert_eq!(h.registry.query_by_role(RoleType::Mediator).len(), 1);

        let report = h.registry.tick(Timestamp(300));
        assert_eq!(report.purged, vec![claim.claim_id]);
        assert!(h.registry.query_by_role(RoleType::Mediator).is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_releases_bond() {
        let h = Harness::new(RegistryConfig::default());
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim).await.unwrap();
        assert_eq!(
            h.registry.bonds.lock().get(&bond_of(0, 0)),
            Some(&RegistryKey::new(h.node(0), RoleType::Mediator))
        );

        h.registry.tick(Timestamp(201));
        assert!(h.registry.bonds.lock().get(&bond_of(0, 0)).is_none());
    }

    #[tokio::test]
    async fn test_banned_node_cannot_claim() {
        let h = Harness::new(RegistryConfig::default());
        assert!(h.registry.ban_node(h.node(1)));
        assert_matches!(
            h.registry
                .submit(h.claim(1, RoleType::SeedNode, 0, 100, 200))
                .await,
            Err(RegistryError::Banned { .. })
        );
        assert!(h.registry.unban_node(&h.node(1)));
        h.registry
            .submit(h.claim(1, RoleType::SeedNode, 0, 100, 200))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_security_manager_window() {
        let h = Harness::new(RegistryConfig::default());
        h.registry
            .submit(h.claim(2, RoleType::SecurityManager, 0, 100, 200))
            .await
            .unwrap();
        let manager = h.node(2);
        assert!(!h.registry.is_active_security_manager(&manager, Timestamp(99)));
        assert!(h.registry.is_active_security_manager(&manager, Timestamp(150)));
        assert!(!h.registry.is_active_security_manager(&manager, Timestamp(200)));
        assert!(!h.registry.is_active_security_manager(&h.node(0), Timestamp(150)));
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let h = Harness::new(RegistryConfig::default());
        let mut events = h.registry.subscribe();
        let claim = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(claim.clone()).await.unwrap();
        assert_matches!(events.recv().await, Ok(RegistryEvent::Activated { role }) if role.claim_id() == claim.claim_id);

        h.clock.0.store(160, Ordering::SeqCst);
        h.registry
            .revoke(h.revocation(0, claim.claim_id, 155))
            .await
            .unwrap();
        assert_matches!(events.recv().await, Ok(RegistryEvent::Revoked { revoked_at, .. }) if revoked_at == Timestamp(155));
    }

    #[tokio::test]
    async fn test_digest_counts_active_entries_only() {
        let h = Harness::new(RegistryConfig::default());
        assert!(h.registry.digest().is_empty());

        let mediator = h.claim(0, RoleType::Mediator, 0, 100, 200);
        h.registry.submit(mediator.clone()).await.unwrap();
        h.registry
            .submit(h.claim(1, RoleType::SeedNode, 0, 110, 200))
            .await
            .unwrap();
        h.registry
            .revoke(h.revocation(0, mediator.claim_id, 150))
            .await
            .unwrap();

        let digest = h.registry.digest();
        assert!(digest.get(RoleType::Mediator).is_none());
        let seeds = digest.get(RoleType::SeedNode).unwrap();
        assert_eq!(seeds.count, 1);
        assert_eq!(seeds.max_claimed_at, Timestamp(110));
    }
}
