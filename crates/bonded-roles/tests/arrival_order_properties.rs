//! Final registry state does not depend on message arrival order

use bonded_core::{RoleType, Timestamp};
use bonded_roles::{RoleMessage, RoleMessageHandler, RoleStatus};
use bonded_testkit::strategies::{arb_distinct_claim_times, arb_role_type};
use bonded_testkit::RegistryFixture;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn newest_claim_wins_in_any_order(
        role in arb_role_type(),
        times in arb_distinct_claim_times(150, 6),
    ) {
        let rt = runtime();
        let newest = rt.block_on(async {
            let fx = RegistryFixture::new();
            let node = fx.node("alice");
            let bond = fx.fund(&node, 0, role);
            for claimed_at in &times {
                let claim = node.claim(role, bond, *claimed_at, 50_000);
                let _ = fx.registry.submit(claim).await;
            }
            fx.registry.query(&node.id(), role)
        });

        let newest = newest.expect("an entry must remain");
        let max = times.iter().copied().max().unwrap_or_default();
        prop_assert_eq!(newest.valid_from(), Timestamp(max));
        prop_assert_eq!(newest.status(), RoleStatus::Active);
    }

    #[test]
    fn claim_and_revocation_commute(revocation_first in any::<bool>(), revoked_at in 100u64..=150) {
        let rt = runtime();
        let (status, recorded_at, pending) = rt.block_on(async {
            let fx = RegistryFixture::new();
            let node = fx.node("alice");
            let claim = fx.bonded_claim(&node, RoleType::Mediator, 100, 5_000);
            let revocation = node.revoke(claim.claim_id, revoked_at);

            let mut messages = vec![
                RoleMessage::Claim(claim.clone()),
                RoleMessage::Revocation(revocation),
            ];
            if revocation_first {
                messages.reverse();
            }
            for message in messages {
                fx.registry.on_message(message).await;
            }
            (
                fx.registry.query(&node.id(), RoleType::Mediator).map(|r| r.status()),
                fx.registry.revocation_of(&claim.claim_id).map(|r| r.revoked_at()),
                fx.registry.pending_revocations(),
            )
        });

        prop_assert_eq!(status, Some(RoleStatus::Revoked));
        prop_assert_eq!(recorded_at, Some(Timestamp(revoked_at)));
        prop_assert_eq!(pending, 0);
    }

    #[test]
    fn earliest_of_several_revocations_is_kept(
        times in arb_distinct_claim_times(50, 4),
    ) {
        let rt = runtime();
        let recorded = rt.block_on(async {
            let fx = RegistryFixture::new();
            let node = fx.node("alice");
            let claim = fx.bonded_claim(&node, RoleType::Moderator, 100, 5_000);
            fx.registry.submit(claim.clone()).await.map_err(|e| e.to_string())?;
            for offset in &times {
                let revocation = node.revoke(claim.claim_id, 100 + offset);
                fx.registry.revoke(revocation).await.map_err(|e| e.to_string())?;
            }
            Ok::<_, String>(fx.registry.revocation_of(&claim.claim_id).map(|r| r.revoked_at()))
        });

        let min = times.iter().copied().min().unwrap_or_default();
        prop_assert_eq!(recorded, Ok(Some(Timestamp(100 + min))));
    }
}
