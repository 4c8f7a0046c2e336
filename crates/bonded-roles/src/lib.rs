//! Bonded Roles - verification, revocation and registry of bonded network roles
//!
//! Participants lock a bond on a public ledger and claim a network role
//! against it. This crate decides which of those claims to believe and keeps
//! the authoritative, concurrently readable view of who holds which role.
//!
//! # Data flow
//!
//! ```text
//! RoleMessage ──► BondedRoleRegistry::submit ──► ProofVerifier ──► slot update
//!             └─► BondedRoleRegistry::revoke ──► RevocationTracker ──► slot update
//! ```
//!
//! [`RegistrySyncCoordinator`] seeds the registry from a snapshot and
//! reconciles against peers; [`RegistryMaintenance`] drives expiry and
//! persistence. Collaborators (identity, ledger, persistence, clock) are the
//! traits in [`effects`].

#![forbid(unsafe_code)]

pub mod authorized;
pub mod config;
pub mod effects;
pub mod error;
pub mod maintenance;
pub mod registry;
pub mod revocation;
pub mod sync;
pub mod verifier;

pub use authorized::{AuthorizedRole, RegistryKey, RoleStatus};
pub use config::{ConfigValidator, RegistryConfig, ValidationError};
pub use effects::{
    BondLedger, CancellationToken, Clock, IdentityService, IngestOutcome, NeverCancel,
    PersistenceStore, RoleMessage, RoleMessageHandler, ShutdownSignal, SystemClock,
};
pub use error::{RegistryError, RegistryResult, RevocationError, SyncError, VerificationError};
pub use maintenance::RegistryMaintenance;
pub use registry::{BondedRoleRegistry, RegistryEvent, RoleView, TickReport};
pub use revocation::{RevocationAuthority, RevocationRecord, RevocationTracker};
pub use sync::{
    ReconcileDecision, RegistryDigest, RegistrySyncCoordinator, RoleDigest, Snapshot,
    SnapshotEntry, SyncReport, SNAPSHOT_VERSION,
};
pub use verifier::{ClaimEvidence, ProofVerifier};
