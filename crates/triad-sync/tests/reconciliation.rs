//! Reconciliation loop behaviour under paused time

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use triad_core::{IdentityId, Layer, ReconciliationConfig, SeatState};
use triad_effects::BroadcastEventBus;
use triad_sync::{BannerKind, Freshness, TriadView, ViewerSession, DISCONNECTED_NOTE};
use triad_testkit::{standard_world, TestWorld, FROZEN_LIMA_IDENTITY, FULL_IDENTITY};

fn session(world: &TestWorld) -> ViewerSession {
    ViewerSession::new(
        world.event_bus(),
        world.seat_store(),
        ReconciliationConfig::default(),
    )
}

fn seat_change(identity: &str, cas_ok: bool, synthetic: bool, message: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "type": "seat.change",
        "identity_id": identity,
        "layer": "lima",
        "from": "OCCUPIED",
        "to": "FROZEN",
        "cas_prev": 1,
        "cas_new": if cas_ok { 2 } else { 1 },
        "cas_ok": cas_ok,
        "synthetic": synthetic,
        "timestamp": 1
    });
    if let Some(message) = message {
        payload["message"] = json!(message);
    }
    payload
}

async fn wait_live(views: &mut watch::Receiver<TriadView>) -> TriadView {
    views
        .wait_for(|v| v.freshness == Freshness::Live)
        .await
        .unwrap()
        .clone()
}

async fn wait_refreshes(views: &mut watch::Receiver<TriadView>, at_least: u64) -> TriadView {
    views
        .wait_for(|v| v.refreshes >= at_least)
        .await
        .unwrap()
        .clone()
}

fn banner_kinds(view: &TriadView) -> Vec<BannerKind> {
    view.banners.iter().map(|b| b.kind).collect()
}

#[tokio::test(start_paused = true)]
async fn first_view_is_live_after_subscribing() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let view = wait_live(&mut views).await;
    let triad = view.triad.clone().unwrap();
    assert!(triad.is_complete());
    assert!(view.is_authoritative());
    assert_eq!(world.bus.subscriber_count(), 1);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn conflict_banner_clears_after_five_seconds() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    world.bus.inject_raw(seat_change(FULL_IDENTITY, false, false, None));
    let view = wait_refreshes(&mut views, before + 1).await;
    assert_eq!(banner_kinds(&view), vec![BannerKind::Conflict]);
    let raised = Instant::now();

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(banner_kinds(&views.borrow()), vec![BannerKind::Conflict]);

    views.wait_for(|v| v.banners.is_empty()).await.unwrap();
    let shown_for = raised.elapsed();
    assert!(shown_for >= Duration::from_secs(5), "cleared after {shown_for:?}");
    assert!(shown_for < Duration::from_millis(5_050), "cleared after {shown_for:?}");
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn synthetic_warning_carries_message_for_eight_seconds() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    world
        .bus
        .inject_raw(seat_change(FULL_IDENTITY, true, true, Some("fallback policy for acme")));
    let view = wait_refreshes(&mut views, before + 1).await;
    assert_eq!(view.banners.len(), 1);
    assert_eq!(view.banners[0].kind, BannerKind::Synthetic);
    assert_eq!(view.banners[0].message, "fallback policy for acme");
    let raised = Instant::now();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(views.borrow().banners.len(), 1);
    views.wait_for(|v| v.banners.is_empty()).await.unwrap();
    assert!(raised.elapsed() >= Duration::from_secs(8));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_write_with_synthetic_cause_raises_both_banners() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    world.bus.inject_raw(seat_change(FULL_IDENTITY, false, true, None));
    let view = wait_refreshes(&mut views, before + 1).await;
    assert_eq!(
        banner_kinds(&view),
        vec![BannerKind::Conflict, BannerKind::Synthetic]
    );

    let view = views
        .wait_for(|v| v.banners.len() == 1)
        .await
        .unwrap()
        .clone();
    assert_eq!(banner_kinds(&view), vec![BannerKind::Synthetic]);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn notifications_trigger_a_reread_not_a_patch() {
    let world = standard_world();
    let identity = IdentityId::new(FULL_IDENTITY);
    let mut session = session(&world);
    let mut views = session.observe(identity.clone()).await;
    let before = wait_live(&mut views).await.refreshes;

    let seat_id = world.seat_id(FULL_IDENTITY, Layer::Numen).unwrap();
    world.seats.external_write(seat_id, SeatState::Frozen, 5);
    // The payload names lima; the view must reflect the store, where numen changed.
    world.bus.inject_raw(seat_change(FULL_IDENTITY, true, false, None));

    let view = wait_refreshes(&mut views, before + 1).await;
    let triad = view.triad.unwrap();
    assert_eq!(triad.state(Layer::Numen), SeatState::Frozen);
    assert_eq!(triad.state(Layer::Lima), SeatState::Occupied);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn other_identities_and_unknown_tags_are_dropped() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    world
        .bus
        .inject_raw(seat_change(FROZEN_LIMA_IDENTITY, false, true, None));
    world.bus.inject_raw(json!({
        "type": "seat.moved",
        "identity_id": FULL_IDENTITY,
    }));
    world.bus.inject_raw(json!({ "identity_id": FULL_IDENTITY }));
    world.bus.inject_raw(seat_change(FULL_IDENTITY, true, false, None));

    let view = wait_refreshes(&mut views, before + 1).await;
    assert!(view.banners.is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(views.borrow().refreshes, before + 1);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_marks_stale_until_reconnected() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    wait_live(&mut views).await;

    world.bus.sever_subscriptions();
    let stale = views
        .wait_for(|v| v.freshness == Freshness::Stale)
        .await
        .unwrap()
        .clone();
    assert_eq!(stale.note.as_deref(), Some(DISCONNECTED_NOTE));
    assert!(stale.triad.is_some());
    assert!(!stale.is_authoritative());

    // A write missed while disconnected shows up after reconnecting.
    let seat_id = world.seat_id(FULL_IDENTITY, Layer::Terra).unwrap();
    world.seats.external_write(seat_id, SeatState::Frozen, 9);

    let live = wait_live(&mut views).await;
    assert_eq!(live.triad.unwrap().state(Layer::Terra), SeatState::Frozen);
    assert_eq!(live.note, None);
    assert_eq!(world.bus.subscriber_count(), 1);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_bus_is_retried_with_backoff() {
    let world = standard_world();
    world.bus.fault().take_down();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;

    let stale = views
        .wait_for(|v| v.freshness == Freshness::Stale)
        .await
        .unwrap()
        .clone();
    assert!(stale.note.unwrap().starts_with("subscribe failed"));
    assert!(stale.triad.is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    world.bus.fault().restore();
    let live = wait_live(&mut views).await;
    assert!(live.triad.is_some());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn failed_reread_keeps_last_triad_but_goes_stale() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    world.seats.fault().take_down();
    world.bus.inject_raw(seat_change(FULL_IDENTITY, true, false, None));
    let view = wait_refreshes(&mut views, before + 1).await;
    assert_eq!(view.freshness, Freshness::Stale);
    assert!(view.triad.is_some());

    world.seats.fault().restore();
    world.bus.inject_raw(seat_change(FULL_IDENTITY, true, false, None));
    let view = wait_refreshes(&mut views, before + 2).await;
    assert_eq!(view.freshness, Freshness::Live);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_identity_has_no_triad() {
    let world = standard_world();
    let mut session = session(&world);
    let mut views = session.observe(IdentityId::new("mallory")).await;
    let view = wait_live(&mut views).await;
    assert!(view.triad.is_none());
    assert!(view.note.unwrap().contains("mallory"));
    assert!(!views.borrow().is_authoritative());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn lag_is_a_dirty_signal() {
    let world = standard_world();
    let bus = BroadcastEventBus::with_capacity(1);
    let mut session = ViewerSession::new(
        Arc::new(bus.clone()),
        world.seat_store(),
        ReconciliationConfig::default(),
    );
    let mut views = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let before = wait_live(&mut views).await.refreshes;

    for _ in 0..3 {
        bus.inject_raw(seat_change(FULL_IDENTITY, true, false, None));
    }
    // One refresh for the lag marker, one for the surviving notification.
    let view = wait_refreshes(&mut views, before + 2).await;
    assert_eq!(view.freshness, Freshness::Live);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn panels_share_one_subscription() {
    let world = standard_world();
    let mut session = session(&world);
    let mut first = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    let mut second = session.views().unwrap();
    wait_live(&mut first).await;
    wait_live(&mut second).await;
    assert_eq!(world.bus.subscriber_count(), 1);
    assert_eq!(*first.borrow(), *second.borrow());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn switching_identity_tears_down_the_previous_loop() {
    let world = standard_world();
    let mut session = session(&world);
    let mut alice = session.observe(IdentityId::new(FULL_IDENTITY)).await;
    wait_live(&mut alice).await;

    let mut bob = session.observe(IdentityId::new(FROZEN_LIMA_IDENTITY)).await;
    let view = wait_live(&mut bob).await;
    assert_eq!(
        view.triad.unwrap().state(Layer::Lima),
        SeatState::Frozen
    );
    assert_eq!(world.bus.subscriber_count(), 1);
    assert_eq!(session.observed(), Some(&IdentityId::new(FROZEN_LIMA_IDENTITY)));
    // The old loop is gone, so its channel is closed.
    assert!(alice.changed().await.is_err());

    session.close().await;
    assert_eq!(world.bus.subscriber_count(), 0);
    assert!(session.observed().is_none());
}
