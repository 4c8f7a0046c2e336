//! In-memory collaborators
//!
//! Each mock can be slowed down or made to fail, to exercise the registry's
//! timeout and error paths.

use async_trait::async_trait;
use bonded_core::{BondAmount, BondProof, BondedError, LedgerRef, NodeId, PublicKey};
use bonded_roles::{BondLedger, IdentityService, PersistenceStore, Snapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Identity
// ============================================================================

/// Node key directory
#[derive(Debug, Default)]
pub struct MockIdentityService {
    keys: RwLock<HashMap<NodeId, PublicKey>>,
    delay: RwLock<Option<Duration>>,
    failure: RwLock<Option<BondedError>>,
}

impl MockIdentityService {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's key
    pub fn register(&self, node_id: NodeId, key: PublicKey) {
        self.keys.write().insert(node_id, key);
    }

    /// Forget a node
    pub fn remove(&self, node_id: &NodeId) {
        self.keys.write().remove(node_id);
    }

    /// Delay every lookup
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Fail every lookup with `error`
    pub fn set_failure(&self, error: Option<BondedError>) {
        *self.failure.write() = error;
    }
}

#[async_trait]
impl IdentityService for MockIdentityService {
    async fn resolve_public_key(&self, node_id: &NodeId) -> Result<PublicKey, BondedError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }
        self.keys
            .read()
            .get(node_id)
            .copied()
            .ok_or_else(|| BondedError::not_found(format!("no key for {node_id}")))
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Ledger holding a fixed set of bond proofs
#[derive(Debug, Default)]
pub struct MockBondLedger {
    proofs: RwLock<HashMap<LedgerRef, BondProof>>,
    delay: RwLock<Option<Duration>>,
    failure: RwLock<Option<BondedError>>,
}

impl MockBondLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bond with the given amount and confirmations
    pub fn add_bond(&self, bond: LedgerRef, holder: NodeId, amount: u64, confirmations: u32) {
        self.insert(BondProof::new(bond, holder, BondAmount::new(amount), confirmations));
    }

    /// Record an arbitrary proof
    pub fn insert(&self, proof: BondProof) {
        self.proofs.write().insert(proof.bond_tx_ref, proof);
    }

    /// Spend a bond
    pub fn remove(&self, bond: &LedgerRef) {
        self.proofs.write().remove(bond);
    }

    /// Delay every lookup
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Fail every lookup with `error`
    pub fn set_failure(&self, error: Option<BondedError>) {
        *self.failure.write() = error;
    }
}

#[async_trait]
impl BondLedger for MockBondLedger {
    async fn bond_proof(&self, bond: &LedgerRef) -> Result<BondProof, BondedError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }
        self.proofs
            .read()
            .get(bond)
            .cloned()
            .ok_or_else(|| BondedError::not_found(format!("no bond at {bond}")))
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Snapshot store keeping the JSON encoding in memory
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<Option<Vec<u8>>>,
    saves: Mutex<usize>,
    failure: RwLock<Option<BondedError>>,
}

impl MemoryPersistence {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a snapshot
    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self, BondedError> {
        let store = Self::new();
        *store.stored.lock() = Some(snapshot.to_json()?);
        Ok(store)
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Fail every operation with `error`
    pub fn set_failure(&self, error: Option<BondedError>) {
        *self.failure.write() = error;
    }

    /// Raw stored bytes
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl PersistenceStore for MemoryPersistence {
    async fn load(&self) -> Result<Option<Snapshot>, BondedError> {
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }
        let stored = self.stored.lock().clone();
        stored.map(|bytes| Snapshot::from_json(&bytes)).transpose()
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), BondedError> {
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }
        let bytes = snapshot.to_json()?;
        *self.stored.lock() = Some(bytes);
        *self.saves.lock() += 1;
        Ok(())
    }
}
