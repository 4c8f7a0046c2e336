//! Property test strategies for bonded role types

use bonded_core::RoleType;
use proptest::prelude::*;

pub use proptest;

/// Any role
pub fn arb_role_type() -> impl Strategy<Value = RoleType> {
    proptest::sample::select(RoleType::ALL.to_vec())
}

/// `(claimed_at, expires_at)` with a positive lifetime, claimed at or before
/// `now` and still valid at `now`
pub fn arb_validity_window(now: u64) -> impl Strategy<Value = (u64, u64)> {
    (0..=now, 1u64..100_000).prop_map(move |(claimed_at, extra)| (claimed_at, now + extra))
}

/// Distinct claim times, in arbitrary order
pub fn arb_distinct_claim_times(max: u64, len: usize) -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::btree_set(0..=max, len)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}
