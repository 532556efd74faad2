// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Integration test for route expiry
//!
//! This test verifies:
//! 1. Stale routes are withdrawn from the routing daemon
//! 2. Finite-distance entries stay in the RIB with a reset timestamp
//! 3. Unreachable entries are deleted from the RIB
//! 4. Withdrawn routes give way to configured default routes
//! 5. A fresh advertisement reinstalls a withdrawn route

use dnd::advertisement::{AdvertisedRoute, Advertisement};
use dnd::config::DefaultRoute;
use dnd::routing::{Decision, Router, RouterConfig};
use dnd::testing::MockDaemon;
use std::time::Duration;
use tokio::time::Instant;

const LOCAL: &str = "dtn://node1";

fn offer(dest: &str, distance: u32) -> Advertisement {
    let mut adv = Advertisement::new("dtn://peer", 4556);
    adv.push(AdvertisedRoute::new(dest, distance, "dtn://peer"));
    adv
}

async fn router_with_route(
    config: RouterConfig,
    dest: &str,
    t0: Instant,
) -> (Router<MockDaemon>, MockDaemon) {
    let daemon = MockDaemon::with_identity(LOCAL, 4556);
    let mut router = Router::new(daemon.clone(), config);
    router.install_default_routes().await.unwrap();
    router
        .process_advertisement(&offer(dest, 0), "10.0.0.2".parse().unwrap(), t0)
        .await
        .unwrap();
    daemon.clear_commands();
    (router, daemon)
}

#[tokio::test]
async fn test_fresh_routes_are_kept() {
    println!("\n=== Test: Fresh Routes Are Kept ===\n");

    let t0 = Instant::now();
    let (mut router, daemon) = router_with_route(RouterConfig::new(LOCAL), "dtn://dest1", t0).await;

    let reaped = router.reap(t0 + Duration::from_secs(25)).await.unwrap();
    assert!(reaped.is_empty());
    assert!(daemon.commands().is_empty());
    println!("✓ Route at exactly the timeout is not expired");
}

#[tokio::test]
async fn test_stale_route_is_withdrawn_and_retained() {
    println!("\n=== Test: Stale Route Withdrawn ===\n");

    let t0 = Instant::now();
    let (mut router, daemon) = router_with_route(RouterConfig::new(LOCAL), "dtn://dest1", t0).await;

    let t26 = t0 + Duration::from_secs(26);
    let reaped = router.reap(t26).await.unwrap();
    assert_eq!(reaped, vec!["dtn://dest1".to_string()]);
    assert_eq!(daemon.commands(), vec!["route del dtn://dest1".to_string()]);
    assert!(daemon.route_link("dtn://dest1").is_none());
    println!("✓ Daemon route withdrawn");

    let entry = router.rib().get("dtn://dest1").expect("entry retained");
    assert_eq!(entry.distance, 1);
    assert_eq!(entry.last_update, t26);
    println!("✓ RIB entry retained with reset timestamp");

    assert!(router.reap(t26 + Duration::from_secs(1)).await.unwrap().is_empty());
    println!("✓ No re-expiry right after reset");
}

#[tokio::test]
async fn test_stale_route_restores_default() {
    println!("\n=== Test: Stale Route Restores Default ===\n");

    let mut config = RouterConfig::new(LOCAL);
    config.default_routes = vec![DefaultRoute::new("dtn://dest1", "default")];
    let t0 = Instant::now();
    let (mut router, daemon) = router_with_route(config, "dtn://dest1", t0).await;
    assert_ne!(daemon.route_link("dtn://dest1").as_deref(), Some("default"));

    router.reap(t0 + Duration::from_secs(26)).await.unwrap();

    assert_eq!(
        daemon.commands(),
        vec![
            "route del dtn://dest1".to_string(),
            "route add dtn://dest1 default".to_string(),
        ]
    );
    assert_eq!(daemon.route_link("dtn://dest1").as_deref(), Some("default"));
    println!("✓ Default route reinstalled after expiry");
}

#[tokio::test]
async fn test_unreachable_entry_is_deleted() {
    println!("\n=== Test: Unreachable Entry Deleted ===\n");

    let t0 = Instant::now();
    let (mut router, _daemon) = router_with_route(RouterConfig::new(LOCAL), "dtn://dest1", t0).await;

    // The same peer now reports the destination unreachable
    let decisions = router
        .process_advertisement(&offer("dtn://dest1", 99), "10.0.0.2".parse().unwrap(), t0)
        .await
        .unwrap();
    assert_eq!(decisions, vec![Decision::Kept { refreshed: true }]);
    assert_eq!(router.rib().get("dtn://dest1").unwrap().distance, 100);

    router.reap(t0 + Duration::from_secs(26)).await.unwrap();
    assert!(router.rib().is_empty());
    println!("✓ Unreachable entry removed on expiry");
}

#[tokio::test]
async fn test_withdrawn_route_comes_back() {
    println!("\n=== Test: Withdrawn Route Comes Back ===\n");

    let t0 = Instant::now();
    let (mut router, daemon) = router_with_route(RouterConfig::new(LOCAL), "dtn://dest1", t0).await;
    let t26 = t0 + Duration::from_secs(26);
    router.reap(t26).await.unwrap();
    assert!(daemon.route_link("dtn://dest1").is_none());

    let decisions = router
        .process_advertisement(&offer("dtn://dest1", 0), "10.0.0.2".parse().unwrap(), t26)
        .await
        .unwrap();
    assert!(matches!(decisions.as_slice(), [Decision::Installed { .. }]));
    assert!(daemon.route_link("dtn://dest1").is_some());
    assert_eq!(daemon.link_table().len(), 1, "The existing link is reused");
    println!("✓ Route reinstalled over the same link");
}

#[tokio::test]
async fn test_reap_with_daemon_down_keeps_entries() {
    println!("\n=== Test: Reap With Daemon Down ===\n");

    let t0 = Instant::now();
    let (mut router, daemon) = router_with_route(RouterConfig::new(LOCAL), "dtn://dest1", t0).await;
    daemon.set_unreachable(true);

    let t26 = t0 + Duration::from_secs(26);
    assert!(router.reap(t26).await.is_err());
    assert_eq!(router.rib().get("dtn://dest1").unwrap().last_update, t0);
    println!("✓ Entry left expired for the next cycle");

    daemon.set_unreachable(false);
    assert_eq!(router.reap(t26).await.unwrap(), vec!["dtn://dest1".to_string()]);
}
