// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Integration test for discovery over loopback UDP
//!
//! This test verifies:
//! 1. The advertiser leads with the local wildcard and skips covered registrations
//! 2. A listening daemon installs routes from a peer's advertisement
//! 3. Empty and malformed datagrams do not stop the listener
//! 4. Startup clears old routes and installs default routes
//! 5. Cancellation stops every task

use clap::Parser;
use dnd::advertisement::{AdvertisedRoute, Advertisement};
use dnd::advertiser::{Advertiser, AdvertiserConfig};
use dnd::config::{CliArgs, DefaultRoute, DndConfiguration};
use dnd::daemon::{self, RunningDaemon};
use dnd::routing::{Router, RouterConfig};
use dnd::shim::SendSockets;
use dnd::testing::MockDaemon;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => panic!("Expected an IPv4 address"),
    }
}

/// Starts a listen-only daemon on an ephemeral loopback port
async fn start_listener(daemon: MockDaemon, config: DndConfiguration) -> RunningDaemon<MockDaemon> {
    let running = daemon::start(daemon, &config, Vec::new(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(running.listen_addrs.len(), 1);
    running
}

fn listen_only_config() -> DndConfiguration {
    DndConfiguration::from_cli(CliArgs::parse_from(["dnd", "-s", "-L", "127.0.0.1:0"])).unwrap()
}

/// Polls until `check` passes or two seconds elapse
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test]
async fn test_advertiser_sends_wildcard_first() {
    println!("\n=== Test: Advertiser Sends Wildcard First ===\n");

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dest = v4(receiver.local_addr().unwrap());

    let daemon = MockDaemon::with_identity("dtn://node1", 4556);
    daemon.register("dtn://node1/ping");
    daemon.register("dtn://elsewhere/app");
    let router = Router::new(daemon, RouterConfig::new("dtn://node1")).into_shared();

    let advertiser = Advertiser::new(
        router,
        SendSockets::new(&[], 1).unwrap(),
        AdvertiserConfig::new(4556, vec![dest]),
    );
    let report = advertiser.tick(Instant::now()).await.expect("tick ran");
    assert_eq!(report.sent, 1);
    assert_eq!(report.routes, 2);
    println!("✓ Tick sent {} routes", report.routes);

    let mut buf = vec![0u8; 2048];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .expect("advertisement received")
        .unwrap();
    let adv = Advertisement::decode(&buf[..n]).unwrap();

    assert_eq!(adv.sender_eid, "dtn://node1");
    assert_eq!(adv.listen_port, 4556);
    assert_eq!(
        adv.routes,
        vec![
            AdvertisedRoute::new("dtn://node1/*", 0, "dtn://node1"),
            AdvertisedRoute::new("dtn://elsewhere/app", 0, "dtn://node1"),
        ]
    );
    println!("✓ Wildcard first, covered registrations omitted");
}

#[tokio::test]
async fn test_peer_advertisement_installs_route() {
    println!("\n=== Test: Peer Advertisement Installs Route ===\n");

    let node_b = MockDaemon::with_identity("dtn://nodeB", 4556);
    let running = start_listener(node_b.clone(), listen_only_config()).await;
    let listen_addr = v4(running.listen_addrs[0]);
    println!("✓ Node B listening on {}", listen_addr);

    let node_a = MockDaemon::with_identity("dtn://nodeA", 4557);
    let router_a = Router::new(node_a, RouterConfig::new("dtn://nodeA")).into_shared();
    let advertiser = Advertiser::new(
        router_a,
        SendSockets::new(&[], 1).unwrap(),
        AdvertiserConfig::new(4557, vec![listen_addr]),
    );
    advertiser.tick(Instant::now()).await.expect("tick ran");

    assert!(
        eventually(|| node_b.route_link("dtn://nodeA/*").is_some()).await,
        "Node B should learn a route to node A"
    );
    let links = node_b.link_table();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].next_hop, "127.0.0.1:4557");
    println!("✓ Node B routes dtn://nodeA/* over {}", links[0].name);

    let router_b = running.router.lock().await;
    let entry = router_b.rib().get("dtn://nodeA/*").expect("RIB entry");
    assert_eq!(entry.distance, 1);
    assert_eq!(entry.next_hop_eid, "dtn://nodeA");
    drop(router_b);

    running.shutdown();
    running.join().await;
}

#[tokio::test]
async fn test_listener_survives_bad_datagrams() {
    println!("\n=== Test: Listener Survives Bad Datagrams ===\n");

    let daemon = MockDaemon::with_identity("dtn://node1", 4556);
    let running = start_listener(daemon.clone(), listen_only_config()).await;
    let target = running.listen_addrs[0];

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"", target).await.unwrap();
    sender.send_to(b"dtn://peer\nnot-a-port\n", target).await.unwrap();
    sender
        .send_to(b"dtn://peer\n4556\ndtn://dest1 0\n", target)
        .await
        .unwrap();
    println!("✓ Sent empty and malformed datagrams");

    sender
        .send_to(b"dtn://peer\n4556\ndtn://dest1 0 dtn://peer\n", target)
        .await
        .unwrap();

    assert!(
        eventually(|| daemon.route_link("dtn://dest1").is_some()).await,
        "Valid advertisement after bad ones should still be processed"
    );
    assert_eq!(daemon.route_table().len(), 1);
    println!("✓ Valid advertisement processed afterwards");

    running.shutdown();
    running.join().await;
}

#[tokio::test]
async fn test_startup_resets_routes() {
    println!("\n=== Test: Startup Resets Routes ===\n");

    let daemon = MockDaemon::with_identity("dtn://node1", 4556);
    daemon.add_existing_route("dtn://stale/*", "dnd_old1");
    daemon.add_existing_route("dtn://gateway/*", "default");

    let mut config = listen_only_config();
    config.default_routes = vec![DefaultRoute::new("dtn://gateway/*", "default")];

    let running = start_listener(daemon.clone(), config).await;
    assert_eq!(running.identity.local_eid, "dtn://node1");

    let routes = daemon.route_table();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].destination, "dtn://gateway/*");
    assert_eq!(routes[0].link, "default");
    println!("✓ Old routes removed, default route installed");

    running.shutdown();
    running.join().await;
}

#[tokio::test]
async fn test_startup_fails_without_local_eid() {
    println!("\n=== Test: Startup Fails Without Local EID ===\n");

    let daemon = MockDaemon::new();
    daemon.set_listen_port(Some(4556));
    let result = daemon::start(
        daemon,
        &listen_only_config(),
        Vec::new(),
        CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, Err(dnd::DndError::LocalEidUnavailable)));
    println!("✓ Startup aborted");
}

#[tokio::test]
async fn test_cancellation_stops_all_tasks() {
    println!("\n=== Test: Cancellation Stops All Tasks ===\n");

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut config = DndConfiguration::from_cli(CliArgs::parse_from(["dnd", "-L", "127.0.0.1:0"]))
        .unwrap();
    config.broadcast_interval = Duration::from_millis(50);

    let daemon = MockDaemon::with_identity("dtn://node1", 4556);
    let cancel = CancellationToken::new();
    let running = daemon::start(
        daemon,
        &config,
        vec![v4(receiver.local_addr().unwrap())],
        cancel.clone(),
    )
    .await
    .unwrap();

    let mut buf = vec![0u8; 2048];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .expect("periodic advertisement received")
        .unwrap();
    assert!(Advertisement::decode(&buf[..n]).is_ok());
    println!("✓ Periodic advertisement received");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), running.join())
        .await
        .expect("tasks stop after cancellation");
    println!("✓ Listener and advertiser stopped");
}
