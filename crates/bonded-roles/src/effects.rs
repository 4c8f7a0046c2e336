//! Collaborator interfaces
//!
//! The registry never talks to the network, the ledger or the disk directly.
//! Everything outside the process is reached through the traits in this
//! module, which keeps the core deterministic under test: the testkit crate
//! ships in-memory implementations of all of them.

use crate::error::RegistryError;
use crate::sync::Snapshot;
use async_trait::async_trait;
use bonded_core::{
    BondProof, BondedError, LedgerRef, NodeId, PublicKey, RevocationClaim, RoleClaim, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

// ============================================================================
// Evidence sources
// ============================================================================

/// Resolves a node's signing key
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Public key registered for `node_id`; `BondedError::NotFound` if unknown
    async fn resolve_public_key(&self, node_id: &NodeId) -> Result<PublicKey, BondedError>;
}

/// Reports bond evidence from the ledger
#[async_trait]
pub trait BondLedger: Send + Sync {
    /// Proof for the output `bond`; `BondedError::NotFound` if it does not exist
    async fn bond_proof(&self, bond: &LedgerRef) -> Result<BondProof, BondedError>;
}

// ============================================================================
// Persistence
// ============================================================================

/// Durable storage for registry snapshots
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Most recently saved snapshot, if any
    async fn load(&self) -> Result<Option<Snapshot>, BondedError>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &Snapshot) -> Result<(), BondedError>;
}

// ============================================================================
// Time
// ============================================================================

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp(ms)
    }
}

// ============================================================================
// Inbound messages
// ============================================================================

/// A role message delivered by the network, at least once and in any order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RoleMessage {
    /// A node claims a role
    Claim(RoleClaim),
    /// A node withdraws a claim
    Revocation(RevocationClaim),
}

impl RoleMessage {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RoleMessage::Claim(_) => "claim",
            RoleMessage::Revocation(_) => "revocation",
        }
    }
}

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Registry state changed (or a replay was confirmed)
    Applied,
    /// Nothing to do: superseded claim or replayed revocation
    Ignored(RegistryError),
    /// Message refused
    Rejected(RegistryError),
}

impl IngestOutcome {
    /// Classify the result of a registry mutation
    pub fn from_result(result: Result<(), RegistryError>) -> Self {
        match result {
            Ok(()) => IngestOutcome::Applied,
            Err(err) if err.is_informational() => IngestOutcome::Ignored(err),
            Err(err) => IngestOutcome::Rejected(err),
        }
    }

    /// Whether the message was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, IngestOutcome::Applied)
    }

    /// Whether the message was refused
    pub fn is_rejected(&self) -> bool {
        matches!(self, IngestOutcome::Rejected(_))
    }
}

/// Entry point for role messages from the transport
#[async_trait]
pub trait RoleMessageHandler: Send + Sync {
    /// Handle one message; never panics on hostile input
    async fn on_message(&self, message: RoleMessage) -> IngestOutcome;
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation for long-running registry work
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves when cancellation is requested
    async fn cancelled(&self);

    /// Non-blocking cancellation check
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Cancellation token that never triggers
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancellationToken for NeverCancel {
    async fn cancelled(&self) {
        futures::future::pending::<()>().await;
    }
}

/// Shutdown switch handing out watch-backed cancellation tokens
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Trigger cancellation for every token handed out
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Token observing this signal
    pub fn token(&self) -> Arc<dyn CancellationToken> {
        Arc::new(WatchCancellationToken {
            rx: self.tx.subscribe(),
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct WatchCancellationToken {
    rx: watch::Receiver<bool>,
}

#[async_trait]
impl CancellationToken for WatchCancellationToken {
    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
