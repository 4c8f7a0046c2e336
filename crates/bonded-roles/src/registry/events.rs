//! Registry change notifications

use crate::authorized::{AuthorizedRole, RegistryKey};
use crate::revocation::RevocationAuthority;
use bonded_core::{ClaimId, NodeId, Timestamp};
use serde::Serialize;

/// A change to the registry, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A verified claim now occupies its key
    Activated {
        /// The new entry
        role: AuthorizedRole,
    },
    /// A newer claim replaced an entry
    Superseded {
        /// Key of both claims
        key: RegistryKey,
        /// Replaced claim
        previous: ClaimId,
        /// Replacing claim
        by: ClaimId,
    },
    /// An entry was revoked
    Revoked {
        /// Key of the entry
        key: RegistryKey,
        /// Revoked claim
        claim_id: ClaimId,
        /// Issuer of the revocation
        revoker: NodeId,
        /// Effective revocation time
        revoked_at: Timestamp,
        /// Owner or security manager
        authority: RevocationAuthority,
    },
    /// An entry passed its validity window
    Expired {
        /// Key of the entry
        key: RegistryKey,
        /// Expired claim
        claim_id: ClaimId,
    },
    /// An entry was removed from the registry
    Purged {
        /// Key of the entry
        key: RegistryKey,
        /// Removed claim
        claim_id: ClaimId,
    },
}

impl RegistryEvent {
    /// Key the event is about
    pub fn key(&self) -> RegistryKey {
        match self {
            RegistryEvent::Activated { role } => role.key(),
            RegistryEvent::Superseded { key, .. }
            | RegistryEvent::Revoked { key, .. }
            | RegistryEvent::Expired { key, .. }
            | RegistryEvent::Purged { key, .. } => *key,
        }
    }
}

/// Result of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Claims moved from active to expired
    pub expired: Vec<ClaimId>,
    /// Claims removed from the registry
    pub purged: Vec<ClaimId>,
    /// Revocation tombstones dropped
    pub tombstones_pruned: usize,
}

impl TickReport {
    /// Whether the pass changed anything
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.purged.is_empty() && self.tombstones_pruned == 0
    }
}
