//! Ready-wired registry fixture

use crate::keys::TestNode;
use crate::mocks::{MemoryPersistence, MockBondLedger, MockIdentityService};
use crate::time::ManualClock;
use bonded_core::{LedgerRef, RoleClaim, RoleType};
use bonded_roles::{BondedRoleRegistry, RegistryConfig, RegistrySyncCoordinator};
use std::sync::Arc;

/// Default fixture start time, in milliseconds
pub const START_MS: u64 = 150;

/// Configuration used by fixtures: defaults with a short grace window and
/// evidence timeout
pub fn test_config() -> RegistryConfig {
    RegistryConfig {
        grace_window_ms: 1_000,
        evidence_timeout_ms: 500,
        ..RegistryConfig::default()
    }
}

/// Registry wired to in-memory collaborators
pub struct RegistryFixture {
    /// Registry under test
    pub registry: Arc<BondedRoleRegistry>,
    /// Key directory
    pub identity: Arc<MockIdentityService>,
    /// Bond ledger
    pub ledger: Arc<MockBondLedger>,
    /// Clock, starting at [`START_MS`]
    pub clock: Arc<ManualClock>,
    /// Snapshot store
    pub store: Arc<MemoryPersistence>,
}

impl RegistryFixture {
    /// Fixture with [`test_config`]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Fixture with a custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        let identity = Arc::new(MockIdentityService::new());
        let ledger = Arc::new(MockBondLedger::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let registry = Arc::new(BondedRoleRegistry::new(
            config,
            identity.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        Self {
            registry,
            identity,
            ledger,
            clock,
            store: Arc::new(MemoryPersistence::new()),
        }
    }

    /// Create a node and register its key
    pub fn node(&self, name: &str) -> TestNode {
        let node = TestNode::named(name);
        self.identity.register(node.id(), node.public_key());
        node
    }

    /// Fund `node`'s bond at `output_index` with exactly the minimum for `role`
    pub fn fund(&self, node: &TestNode, output_index: u32, role: RoleType) -> LedgerRef {
        let bond = node.bond_ref(output_index);
        let amount = self
            .registry
            .config()
            .min_bond(role)
            .map_or(1, |min| min.units());
        self.ledger.add_bond(bond, node.id(), amount, 6);
        bond
    }

    /// Claim `role` against a freshly funded bond dedicated to that role
    pub fn bonded_claim(
        &self,
        node: &TestNode,
        role: RoleType,
        claimed_at: u64,
        expires_at: u64,
    ) -> RoleClaim {
        let bond = self.fund(node, u32::from(role.code()), role);
        node.claim(role, bond, claimed_at, expires_at)
    }

    /// Sync coordinator over the fixture's registry
    pub fn coordinator(&self) -> RegistrySyncCoordinator {
        RegistrySyncCoordinator::new(self.registry.clone())
    }

    /// Second fixture sharing keys and ledger but with an empty registry
    pub fn peer(&self) -> Self {
        let clock = Arc::new(ManualClock::new(self.registry.now().as_millis()));
        let registry = Arc::new(BondedRoleRegistry::new(
            self.registry.config().clone(),
            self.identity.clone(),
            self.ledger.clone(),
            clock.clone(),
        ));
        Self {
            registry,
            identity: self.identity.clone(),
            ledger: self.ledger.clone(),
            clock,
            store: Arc::new(MemoryPersistence::new()),
        }
    }
}

impl Default for RegistryFixture {
    fn default() -> Self {
        Self::new()
    }
}
