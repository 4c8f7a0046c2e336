//! Point-in-time role views

use crate::authorized::AuthorizedRole;
use bonded_core::{RoleType, Timestamp};

/// Materialized entries of one role, ordered by `(valid_from, claim_id)`
///
/// The view is a copy: later registry changes do not show up in it. It
/// iterates once and can be replayed with [`RoleView::rewind`] or by cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleView {
    role: RoleType,
    taken_at: Timestamp,
    entries: Vec<AuthorizedRole>,
    cursor: usize,
}

impl RoleView {
    pub(crate) fn new(role: RoleType, taken_at: Timestamp, mut entries: Vec<AuthorizedRole>) -> Self {
        entries.sort_by_key(|entry| (entry.valid_from(), entry.claim_id()));
        Self {
            role,
            taken_at,
            entries,
            cursor: 0,
        }
    }

    /// Role of every entry in the view
    pub fn role(&self) -> RoleType {
        self.role
    }

    /// When the view was taken
    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    /// Restart iteration from the first entry
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// All entries, regardless of the iteration cursor
    pub fn as_slice(&self) -> &[AuthorizedRole] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the view holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for RoleView {
    type Item = AuthorizedRole;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.entries.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RoleView {}

#[cfg(test)]
mod tests {
    use super::*;
    use bonded_core::{hash, LedgerRef, NodeId, RoleClaim, SigningKey};
    use std::time::Duration;

    fn role_at(seed: u8, claimed_at: u64) -> AuthorizedRole {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let claim = RoleClaim::sign(
            &key,
            NodeId::from_public_key(&key.verifying_key()),
            RoleType::SeedNode,
            LedgerRef::new(hash(&[seed]), 0),
            Timestamp(claimed_at),
            Timestamp(claimed_at + 1000),
        );
        AuthorizedRole::from_verified(&claim, Duration::from_secs(60))
    }

    #[test]
    fn test_view_is_ordered_and_restartable() {
        let mut view = RoleView::new(
            RoleType::SeedNode,
            Timestamp(500),
            vec![role_at(1, 300), role_at(2, 100), role_at(3, 200)],
        );
        let first: Vec<_> = view.by_ref().map(|r| r.valid_from()).collect();
        assert_eq!(first, vec![Timestamp(100), Timestamp(200), Timestamp(300)]);
        assert_eq!(view.next(), None);

        view.rewind();
        assert_eq!(view.len(), 3);
        assert_eq!(view.count(), 3);
    }
}
