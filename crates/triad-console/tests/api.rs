//! Endpoint behaviour of the console facade

use assert_matches::assert_matches;
use serde_json::json;
use std::time::Duration;
use triad_console::{
    ConsoleApi, FlowEvalRequest, Handlers, SaveRequest, SeatMutateRequest, ValidateRequest,
    WorldFixture,
};
use triad_core::{
    ConsoleConfig, ConsoleError, DomainId, FlowReason, IdentityId, Layer, OperatorContext,
    PolicyScope, ReceiptKind, SeatState,
};
use triad_sync::Freshness;
use triad_testkit::{
    standard_world, TestWorld, BARE_IDENTITY, CI_DOMAIN, FROZEN_LIMA_IDENTITY, FULL_IDENTITY,
    OPS_DOMAIN, OPS_POLICY, ROOT_DOMAIN,
};

fn handlers(world: &TestWorld) -> Handlers {
    Handlers {
        seats: world.seat_store(),
        policies: world.policy_store(),
        domains: world.directory(),
        domain_seats: world.domain_seat_store(),
        receipts: world.receipt_log(),
        bus: world.event_bus(),
        evaluator: world.policy_evaluator(),
        clock: world.clock_effects(),
    }
}

fn api(world: &TestWorld) -> ConsoleApi {
    ConsoleApi::new(handlers(world), ConsoleConfig::default())
}

fn ctx() -> OperatorContext {
    OperatorContext::acting(FULL_IDENTITY, OPS_DOMAIN)
}

#[tokio::test]
async fn triad_read_has_wire_shape() {
    let world = standard_world();
    let response = api(&world)
        .get_triad(&IdentityId::new(FULL_IDENTITY))
        .await
        .unwrap();
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["identity_id"], json!(FULL_IDENTITY));
    assert_eq!(wire["complete"], json!(true));
    let layers: Vec<_> = wire["seats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["layer"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(layers, ["terra", "numen", "lima"]);
    assert_eq!(wire["seats"][2]["state"], json!("OCCUPIED"));
    assert!(wire["seats"][0]["updated_at"].is_u64());
}

#[tokio::test]
async fn bare_identity_reads_as_empty_and_unknown_is_not_found() {
    let world = standard_world();
    let api = api(&world);
    let bare = api.get_triad(&IdentityId::new(BARE_IDENTITY)).await.unwrap();
    assert!(!bare.complete);
    assert!(bare
        .seats
        .iter()
        .all(|s| s.state == SeatState::Empty && s.updated_at.is_none() && s.cas_version == 0));
    assert_matches!(
        api.get_triad(&IdentityId::new("mallory")).await,
        Err(ConsoleError::NotFound { .. })
    );
}

#[tokio::test]
async fn policy_read_modes() {
    let world = standard_world();
    let api = api(&world);
    let ops = DomainId::new(OPS_DOMAIN);
    assert_eq!(api.policy_get(&ops, PolicyScope::Local).await.unwrap(), OPS_POLICY);
    let inherited = api.policy_get(&ops, PolicyScope::Inherited).await.unwrap();
    assert!(inherited.contains("allow ci.*"));
    assert!(!inherited.contains("deny ci.call.v0"));
}

#[tokio::test]
async fn validate_reports_widening_candidates() {
    let world = standard_world();
    let api = api(&world);
    let ops = DomainId::new(OPS_DOMAIN);

    let widening = api
        .policy_validate(
            &ops,
            ValidateRequest {
                content: "deny ci.call.v0\nallow db.*".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(!widening.success);
    assert_eq!(widening.hints[0].line, 2);

    let tightening = api
        .policy_validate(
            &ops,
            ValidateRequest {
                content: "deny ci.call.v0\ndeny ci.deploy.v1".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(tightening.success);
    assert!(tightening.hints.is_empty());
}

#[tokio::test]
async fn save_must_name_the_routed_authority() {
    let world = standard_world();
    let api = api(&world);
    let ops = DomainId::new(OPS_DOMAIN);
    let body = SaveRequest {
        content: "deny ci.call.*".to_string(),
        domain_id: ops.clone(),
    };

    assert_matches!(
        api.policy_save(&ctx(), &ops, body.clone()).await,
        Err(ConsoleError::Invalid { .. })
    );
    assert!(world.policies.commits().is_empty());

    let root = DomainId::new(ROOT_DOMAIN);
    assert_eq!(api.routed_target(&ops).await.unwrap(), root);
    let saved = api.policy_save(&ctx(), &root, body).await.unwrap();
    assert_matches!(
        saved.receipt.kind,
        ReceiptKind::PolicyCommit { ref domain_id, ref committed_by, .. }
            if domain_id == &ops && committed_by == &root
    );
    assert_eq!(
        api.policy_get(&ops, PolicyScope::Local).await.unwrap(),
        "deny ci.call.*"
    );
}

#[test]
fn save_body_uses_camel_case_domain_field() {
    let body: SaveRequest =
        serde_json::from_value(json!({"content": "deny x", "domainId": "acme.ops"})).unwrap();
    assert_eq!(body.domain_id, DomainId::new(OPS_DOMAIN));
}

#[tokio::test]
async fn flow_eval_allows_through_the_chain_and_vetoes_frozen() {
    let world = standard_world();
    let api = api(&world);
    let request: FlowEvalRequest = serde_json::from_value(json!({
        "identity_id": FULL_IDENTITY,
        "domain_id": CI_DOMAIN,
        "action": "ci.call.v1",
        "direction": "lateral",
        "parent_approved": true
    }))
    .unwrap();

    let allowed = api.flow_eval(&ctx(), request.clone()).await.unwrap();
    assert!(allowed.allow);
    assert_eq!(allowed.reason, FlowReason::PolicyAllow);
    assert_eq!(allowed.policy_version.len(), 64);
    assert_eq!(allowed.triad_seats.len(), 3);

    let vetoed = api
        .flow_eval(
            &ctx(),
            FlowEvalRequest {
                identity_id: IdentityId::new(FROZEN_LIMA_IDENTITY),
                ..request
            },
        )
        .await
        .unwrap();
    assert!(!vetoed.allow);
    assert_eq!(vetoed.reason, FlowReason::FrozenVeto(Layer::Lima));
}

#[tokio::test]
async fn preview_is_never_authoritative() {
    let world = standard_world();
    let preview = api(&world).flow_preview();
    assert!(!preview.authoritative);
    assert!(!preview.scenarios.is_empty());
    assert!(preview.scenarios.iter().all(|s| !s.authoritative));
}

#[tokio::test]
async fn seat_mutate_follows_the_cas_protocol() {
    let world = standard_world();
    let api = api(&world);
    let alice = IdentityId::new(FULL_IDENTITY);
    let seat_id = api.seat_for(&alice, Layer::Lima).await.unwrap();
    let write = SeatMutateRequest {
        seat_id,
        expected_cas: 1,
        new_state: SeatState::Frozen,
    };

    let first = api.seat_mutate(&ctx(), write.clone()).await.unwrap();
    assert!(first.ok);
    assert_eq!((first.cas_prev, first.cas_new), (1, 2));

    let session = ctx();
    let stale = SeatMutateRequest {
        new_state: SeatState::Occupied,
        ..write
    };
    let rejected = api.seat_mutate(&session, stale.clone()).await.unwrap();
    assert!(!rejected.ok);
    assert_eq!(rejected.cas_new, 2);
    let retried = api.seat_mutate(&session, stale.clone()).await.unwrap();
    assert!(!retried.ok && retried.blind_retry);
    assert_eq!((retried.cas_prev, retried.cas_new), (1, 2));

    api.end_session(&session);
    let fresh = api.seat_mutate(&session, stale).await.unwrap();
    assert!(!fresh.ok && !fresh.blind_retry);
}

#[tokio::test]
async fn seat_write_commits_and_notifies_while_receipts_are_down() {
    let world = standard_world();
    let api = api(&world);
    let carol = IdentityId::new(BARE_IDENTITY);
    let seat_id = api.seat_for(&carol, Layer::Terra).await.unwrap();
    let mut session = api.viewer_session();
    let mut views = session.observe(carol.clone()).await;
    views
        .wait_for(|v| v.freshness == Freshness::Live)
        .await
        .unwrap();

    world.receipts.fault().take_down();
    let written = api
        .seat_mutate(
            &ctx(),
            SeatMutateRequest {
                seat_id,
                expected_cas: 0,
                new_state: SeatState::Assigned,
            },
        )
        .await
        .unwrap();
    assert!(written.ok);
    assert_eq!(written.cas_new, 1);
    assert!(world.receipts.is_empty());

    // Only the change notification can bring the new state into the view.
    tokio::time::timeout(
        Duration::from_secs(5),
        views.wait_for(|v| {
            v.triad
                .as_ref()
                .is_some_and(|t| t.state(Layer::Terra) == SeatState::Assigned)
        }),
    )
    .await
    .unwrap()
    .unwrap();
    session.close().await;
}

#[tokio::test]
async fn viewers_follow_writes_made_through_the_facade() {
    let world = standard_world();
    let api = api(&world);
    let alice = IdentityId::new(FULL_IDENTITY);
    let mut session = api.viewer_session();
    let mut views = session.observe(alice.clone()).await;
    views
        .wait_for(|v| v.freshness == Freshness::Live)
        .await
        .unwrap();

    let seat_id = api.seat_for(&alice, Layer::Numen).await.unwrap();
    let outcome = api
        .seat_mutate(
            &ctx(),
            SeatMutateRequest {
                seat_id,
                expected_cas: 1,
                new_state: SeatState::Frozen,
            },
        )
        .await
        .unwrap();
    assert!(outcome.ok);

    let view = tokio::time::timeout(
        Duration::from_secs(5),
        views.wait_for(|v| {
            v.triad
                .as_ref()
                .is_some_and(|t| t.state(Layer::Numen) == SeatState::Frozen)
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(view.freshness, Freshness::Live);
    session.close().await;
}

#[tokio::test]
async fn sample_fixture_drives_the_facade() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/acme.toml");
    let world = WorldFixture::load(std::path::Path::new(path))
        .unwrap()
        .materialize();
    let api = ConsoleApi::new(world.handlers(), ConsoleConfig::default());

    let bob = api.get_triad(&IdentityId::new("bob")).await.unwrap();
    assert_eq!(bob.seats[2].state, SeatState::Frozen);
    assert_eq!(bob.seats[2].cas_version, 2);

    let fallback = api
        .flow_eval(
            &ctx(),
            FlowEvalRequest {
                identity_id: IdentityId::new("alice"),
                domain_id: DomainId::new("acme.fallback"),
                action: "db.read".to_string(),
                direction: triad_core::Direction::Lateral,
                action_domain: None,
                seat_domain: None,
                parent_approved: false,
                context: None,
            },
        )
        .await
        .unwrap();
    assert!(fallback.allow);
    assert!(fallback.synthetic);
    assert_eq!(world.receipts.len(), 1);
}

#[tokio::test]
async fn fixture_file_round_trip_through_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.toml");
    std::fs::write(
        &path,
        "[[domains]]\nid = \"solo\"\npolicy = \"allow *\"\n[[identities]]\nid = \"dana\"\nterra = \"ASSIGNED\"\n",
    )
    .unwrap();
    let world = WorldFixture::load(&path).unwrap().materialize();
    let api = ConsoleApi::new(world.handlers(), ConsoleConfig::default());
    let dana = api.get_triad(&IdentityId::new("dana")).await.unwrap();
    assert_eq!(dana.seats[0].state, SeatState::Assigned);
    assert!(!dana.complete);
    assert_eq!(
        api.routed_target(&DomainId::new("solo")).await.unwrap(),
        DomainId::new("solo")
    );
}

#[tokio::test]
async fn sample_config_switches_to_self_authority() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/console.toml");
    let config = ConsoleConfig::load(std::path::Path::new(path)).unwrap();
    assert_eq!(config.policy.max_chain_depth, 32);

    let world = standard_world();
    let api = ConsoleApi::new(handlers(&world), config);
    let ops = DomainId::new(OPS_DOMAIN);
    assert_eq!(api.routed_target(&ops).await.unwrap(), ops);
}
