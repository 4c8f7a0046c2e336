//! Bonded Core - value types for bonded network roles
//!
//! This crate holds the pure, synchronous vocabulary shared by the bonded role
//! registry and its collaborators. Nothing in here performs I/O or keeps state.
//!
//! # Contents
//!
//! - **Identifiers**: [`NodeId`], [`ClaimId`], [`LedgerRef`] and the [`Hash32`] digest
//! - **Time**: millisecond [`Timestamp`] with saturating arithmetic
//! - **Roles**: the [`RoleType`] catalogue and [`BondAmount`]
//! - **Claims**: signed [`RoleClaim`] and [`RevocationClaim`] with canonical encodings
//! - **Evidence**: ledger-provided [`BondProof`]
//! - **Errors**: the unified collaborator error [`BondedError`]
//!
//! Validation of claims against evidence lives in `bonded-roles`; this crate only
//! knows how to encode, hash and sign them.

#![forbid(unsafe_code)]

// === Core Modules ===

/// Bond evidence reported by the ledger
pub mod bond;

/// Role and revocation claims with canonical signing payloads
pub mod claim;

/// Unified error handling for collaborator boundaries
pub mod errors;

/// Single hashing entry point (SHA-256)
pub mod hash;

/// Node, claim and ledger identifiers
pub mod identifiers;

/// Role catalogue and bond amounts
pub mod role;

/// Millisecond timestamps
pub mod time;

// === Public API Re-exports ===

pub use bond::BondProof;
pub use claim::{RevocationClaim, RoleClaim};
pub use errors::{BondedError, Result};
pub use hash::{hash, hasher, Hash32};
pub use identifiers::{ClaimId, LedgerRef, NodeId};
pub use role::{BondAmount, RoleType};
pub use time::Timestamp;

// Signature primitives are Ed25519 throughout.
pub use ed25519_dalek::{Signature, SigningKey, VerifyingKey as PublicKey};
