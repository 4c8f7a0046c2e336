//! Per-key storage cells

use crate::authorized::AuthorizedRole;
use bonded_core::RoleClaim;
use parking_lot::RwLock;

/// A stored entry: the authorized role and the claim it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegistryEntry {
    pub(crate) role: AuthorizedRole,
    pub(crate) claim: RoleClaim,
}

#[derive(Debug, Default)]
pub(crate) struct SlotState {
    pub(crate) entry: Option<RegistryEntry>,
    /// Set when the slot was removed from the key map; writers must retry
    pub(crate) retired: bool,
}

/// Lock cell for one `(node, role)` key
#[derive(Debug, Default)]
pub(crate) struct KeySlot {
    pub(crate) state: RwLock<SlotState>,
}

impl KeySlot {
    /// Clone of the current entry
    pub(crate) fn entry(&self) -> Option<RegistryEntry> {
        self.state.read().entry.clone()
    }

    /// Clone of the current authorized role
    pub(crate) fn role(&self) -> Option<AuthorizedRole> {
        self.state.read().entry.as_ref().map(|entry| entry.role.clone())
    }
}
