//! Domain seat lifecycle

use assert_matches::assert_matches;
use triad_core::{
    ConsoleError, ConsoleEvent, DomainId, DomainSeatStatus, DomainSeatType, IdentityId,
    OperatorContext, PolicyConfig, PolicyDigest,
};
use triad_policy::PolicyResolver;
use triad_seats::DomainSeatRegistry;
use triad_testkit::{assert_receipt_kinds, published_tags, standard_world, TestWorld, OPS_DOMAIN};

fn registry(world: &TestWorld) -> DomainSeatRegistry {
    let resolver = PolicyResolver::new(
        world.directory(),
        world.policy_store(),
        &PolicyConfig::default(),
    );
    DomainSeatRegistry::new(
        world.directory(),
        world.domain_seat_store(),
        resolver,
        world.receipt_log(),
        world.event_bus(),
        world.clock_effects(),
    )
}

#[tokio::test]
async fn appointment_records_effective_policy() {
    let world = standard_world();
    let reg = registry(&world);
    let ctx = OperatorContext::new_session();
    let seat = reg
        .appoint(
            &ctx,
            &DomainId::new(OPS_DOMAIN),
            DomainSeatType::Member,
            Some(IdentityId::new("alice")),
            "ops:on-call",
        )
        .await
        .unwrap();
    assert_eq!(seat.status, DomainSeatStatus::Active);
    assert!(seat.rego_text.contains("#@layer acme inherited"));
    assert_eq!(seat.policy_version.digest, PolicyDigest::of(&seat.rego_text));
    let receipts = world.receipts.snapshot();
    assert_eq!(receipts[0].id, seat.appointment_receipt);
    assert_eq!(published_tags(&world.bus), ["domain_seat.change"]);
}

#[tokio::test]
async fn lifecycle_and_terminal_detach() {
    let world = standard_world();
    let reg = registry(&world);
    let ctx = OperatorContext::new_session();
    let seat = reg
        .appoint(&ctx, &DomainId::new(OPS_DOMAIN), DomainSeatType::Member, None, "ops")
        .await
        .unwrap();

    assert_eq!(reg.freeze(&ctx, seat.id).await.unwrap().status, DomainSeatStatus::Frozen);
    assert_matches!(reg.freeze(&ctx, seat.id).await, Err(ConsoleError::Invalid { .. }));
    assert_eq!(reg.unfreeze(&ctx, seat.id).await.unwrap().status, DomainSeatStatus::Active);
    assert_eq!(reg.detach(&ctx, seat.id).await.unwrap().status, DomainSeatStatus::Detached);
    assert_matches!(reg.unfreeze(&ctx, seat.id).await, Err(ConsoleError::Invalid { .. }));

    // The record persists for audit.
    let listed = reg.list(&DomainId::new(OPS_DOMAIN)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_receipt_kinds(
        &world.receipts,
        &["domain_seat", "domain_seat", "domain_seat", "domain_seat"],
    );
    let last = world.bus.published().pop().unwrap();
    assert_matches!(
        last,
        ConsoleEvent::DomainSeatChange(notice)
            if notice.from == Some(DomainSeatStatus::Active) && notice.to == DomainSeatStatus::Detached
    );
}

#[tokio::test]
async fn one_live_root_seat_per_domain() {
    let world = standard_world();
    let reg = registry(&world);
    let ctx = OperatorContext::new_session();
    let ops = DomainId::new(OPS_DOMAIN);
    let root = reg
        .appoint(&ctx, &ops, DomainSeatType::Root, None, "root")
        .await
        .unwrap();
    assert_matches!(
        reg.appoint(&ctx, &ops, DomainSeatType::Root, None, "root").await,
        Err(ConsoleError::Conflict { .. })
    );
    reg.detach(&ctx, root.id).await.unwrap();
    assert!(reg
        .appoint(&ctx, &ops, DomainSeatType::Root, None, "root")
        .await
        .is_ok());
}

#[tokio::test]
async fn unknown_domain_is_not_found() {
    let world = standard_world();
    assert_matches!(
        registry(&world)
            .appoint(
                &OperatorContext::new_session(),
                &DomainId::new("nowhere"),
                DomainSeatType::Member,
                None,
                "x"
            )
            .await,
        Err(ConsoleError::NotFound { .. })
    );
}
