//! Slow or failing collaborators, and concurrent writers

use assert_matches::assert_matches;
use bonded_core::{BondedError, RoleType, Timestamp};
use bonded_roles::{RegistryError, RoleStatus, VerificationError};
use bonded_testkit::{init_test_tracing, RegistryFixture};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn slow_identity_lookup_times_out() {
    init_test_tracing();
    let fx = RegistryFixture::new();
    let node = fx.node("slow");
    let claim = fx.bonded_claim(&node, RoleType::Mediator, 100, 5_000);

    fx.identity.set_delay(Some(Duration::from_secs(10)));
    let result = fx.registry.submit(claim.clone()).await;
    assert_matches!(
        result,
        Err(RegistryError::Verification(VerificationError::EvidenceUnavailable { ref reason }))
            if reason.contains("public key")
    );
    assert!(fx.registry.is_empty());

    // nothing was reserved, so a later attempt succeeds
    fx.identity.set_delay(None);
    fx.registry.submit(claim).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_ledger_times_out() {
    let fx = RegistryFixture::new();
    let node = fx.node("slow");
    let claim = fx.bonded_claim(&node, RoleType::SeedNode, 100, 5_000);

    fx.ledger.set_delay(Some(Duration::from_secs(10)));
    assert_matches!(
        fx.registry.submit(claim).await,
        Err(RegistryError::Verification(VerificationError::EvidenceUnavailable { ref reason }))
            if reason.contains("bond proof")
    );
}

#[tokio::test]
async fn failing_ledger_is_reported_as_unavailable() {
    let fx = RegistryFixture::new();
    let node = fx.node("alice");
    let claim = fx.bonded_claim(&node, RoleType::Mediator, 100, 5_000);

    fx.ledger
        .set_failure(Some(BondedError::network("ledger node unreachable")));
    assert_matches!(
        fx.registry.submit(claim).await,
        Err(RegistryError::Verification(VerificationError::EvidenceUnavailable { .. }))
    );
}

#[tokio::test]
async fn spent_bond_is_unavailable() {
    let fx = RegistryFixture::new();
    let node = fx.node("alice");
    let claim = fx.bonded_claim(&node, RoleType::Mediator, 100, 5_000);
    fx.ledger.remove(&claim.bond_tx_ref);

    assert_matches!(
        fx.registry.submit(claim).await,
        Err(RegistryError::Verification(VerificationError::EvidenceUnavailable { ref reason }))
            if reason.contains("not found")
    );
}

#[tokio::test]
async fn unknown_claimant_cannot_register() {
    let fx = RegistryFixture::new();
    let node = fx.node("ghost");
    let claim = fx.bonded_claim(&node, RoleType::Mediator, 100, 5_000);
    fx.identity.remove(&node.id());

    assert_matches!(
        fx.registry.submit(claim).await,
        Err(RegistryError::Verification(VerificationError::EvidenceUnavailable { .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_for_one_key_keep_the_newest() {
    init_test_tracing();
    let fx = RegistryFixture::new();
    let node = fx.node("busy");
    let bond = fx.fund(&node, 0, RoleType::Mediator);

    let handles: Vec<_> = (100..132u64)
        .map(|claimed_at| {
            let registry = fx.registry.clone();
            let claim = node.claim(RoleType::Mediator, bond, claimed_at, 10_000);
            tokio::spawn(async move { registry.submit(claim).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(
            matches!(result, Ok(()) | Err(RegistryError::Superseded { .. })),
            "unexpected outcome: {result:?}"
        );
    }

    let role = fx.registry.query(&node.id(), RoleType::Mediator).unwrap();
    assert_eq!(role.valid_from(), Timestamp(131));
    assert_eq!(fx.registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_for_many_keys_all_land() {
    let fx = RegistryFixture::new();
    let nodes: Vec<_> = (0..24).map(|i| fx.node(&format!("node-{i}"))).collect();

    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let registry = fx.registry.clone();
            let claim = fx.bonded_claim(node, RoleType::ExplorerNode, 100, 10_000);
            tokio::spawn(async move { registry.submit(claim).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fx.registry.active_by_role(RoleType::ExplorerNode).len(), nodes.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_claims_on_one_bond_admit_a_single_holder() {
    let fx = RegistryFixture::new();
    let node = fx.node("greedy");
    let bond = fx.fund(&node, 0, RoleType::Arbitrator);

    let roles = [RoleType::Arbitrator, RoleType::Mediator, RoleType::Moderator, RoleType::SeedNode];
    let handles: Vec<_> = roles
        .iter()
        .map(|role| {
            let registry = fx.registry.clone();
            let claim = node.claim(*role, bond, 100, 10_000);
            tokio::spawn(async move { registry.submit(claim).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(err) => assert_matches!(
                err,
                RegistryError::Verification(VerificationError::DuplicateBondUsage { .. })
            ),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(fx.registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn security_managers_revoking_each_other_do_not_deadlock() {
    let fx = RegistryFixture::new();

    for round in 0..8u64 {
        let a = fx.node(&format!("manager-a-{round}"));
        let b = fx.node(&format!("manager-b-{round}"));
        let claim_a = fx.bonded_claim(&a, RoleType::SecurityManager, 50, 10_000);
        let claim_b = fx.bonded_claim(&b, RoleType::SecurityManager, 50, 10_000);
        fx.registry.submit(claim_a.clone()).await.unwrap();
        fx.registry.submit(claim_b.clone()).await.unwrap();

        let at = 120 + round;
        let registry = fx.registry.clone();
        let a_revokes_b = a.revoke(claim_b.claim_id, at);
        let first = tokio::spawn(async move { registry.revoke(a_revokes_b).await });
        let registry = fx.registry.clone();
        let b_revokes_a = b.revoke(claim_a.claim_id, at);
        let second = tokio::spawn(async move { registry.revoke(b_revokes_a).await });

        let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
            (first.await.unwrap(), second.await.unwrap())
        })
        .await
        .expect("mutual revocation stalled");

        // whichever lands first strips the other of authority at `at`
        assert!(first.is_ok() || second.is_ok());
        let statuses = [
            fx.registry.query(&a.id(), RoleType::SecurityManager).map(|r| r.status()),
            fx.registry.query(&b.id(), RoleType::SecurityManager).map(|r| r.status()),
        ];
        assert!(statuses.contains(&Some(RoleStatus::Revoked)));
    }
}
