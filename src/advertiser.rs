// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Periodic advertisement of local registrations and learned routes
//!
//! Each tick runs entirely under the router lock: query registrations,
//! build and send the advertisement, then reap expired RIB entries. If the
//! routing daemon cannot list registrations the whole tick is skipped.

use crate::advertisement::{AdvertisedRoute, Advertisement, MAX_DATAGRAM_SIZE};
use crate::console::RoutingDaemon;
use crate::eid;
use crate::error::ConsoleError;
use crate::routing::{Router, SharedRouter};
use crate::shim::SendSockets;
use log::{debug, info, trace, warn};
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default time between advertisements
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(10);

/// What the advertiser sends and where
#[derive(Debug, Clone)]
pub struct AdvertiserConfig {
    /// TCP convergence layer port put in the advertisement header
    pub listen_port: u16,
    pub destinations: Vec<SocketAddrV4>,
    pub interval: Duration,
    /// Advertise `<local EID>/*` at distance 0
    pub advertise_local_wildcard: bool,
    /// Also advertise RIB entries
    pub rebroadcast_routes: bool,
}

impl AdvertiserConfig {
    pub fn new(listen_port: u16, destinations: Vec<SocketAddrV4>) -> Self {
        Self {
            listen_port,
            destinations,
            interval: DEFAULT_BROADCAST_INTERVAL,
            advertise_local_wildcard: true,
            rebroadcast_routes: false,
        }
    }
}

/// Result of one advertisement tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Routes carried by the advertisement
    pub routes: usize,
    /// Destinations the advertisement reached
    pub sent: usize,
    /// RIB destinations reaped after sending
    pub reaped: Vec<String>,
}

/// Builds the advertisement for this node
///
/// Order: the local wildcard (if enabled), then every registration not
/// covered by an entry already listed, then RIB entries (if
/// rebroadcasting). Local entries are at distance 0 via the local EID.
pub async fn build_advertisement<D: RoutingDaemon>(
    router: &Router<D>,
    config: &AdvertiserConfig,
) -> Result<Advertisement, ConsoleError> {
    let registrations = router.daemon().registrations().await?;
    let local = router.local_eid();
    let mut adv = Advertisement::new(local, config.listen_port);

    if config.advertise_local_wildcard {
        adv.push(AdvertisedRoute::new(eid::node_wildcard(local), 0, local));
    }

    for registration in registrations {
        if adv
            .routes
            .iter()
            .any(|r| eid::matches(&r.destination, &registration))
        {
            trace!("registration {} already covered", registration);
            continue;
        }
        adv.push(AdvertisedRoute::new(registration, 0, local));
    }

    if config.rebroadcast_routes {
        for entry in router.rib().iter() {
            adv.push(AdvertisedRoute::new(
                entry.destination.clone(),
                entry.distance,
                entry.next_hop_eid.clone(),
            ));
        }
    }

    Ok(adv)
}

/// Sends advertisements and reaps stale routes on a fixed period
pub struct Advertiser<D> {
    router: SharedRouter<D>,
    sockets: SendSockets,
    config: AdvertiserConfig,
}

impl<D: RoutingDaemon + 'static> Advertiser<D> {
    pub fn new(router: SharedRouter<D>, sockets: SendSockets, config: AdvertiserConfig) -> Self {
        Self {
            router,
            sockets,
            config,
        }
    }

    /// Runs one advertisement cycle
    ///
    /// Returns `None` if the tick was skipped because the routing daemon
    /// did not answer.
    pub async fn tick(&self, now: Instant) -> Option<TickReport> {
        let mut router = self.router.lock().await;

        let adv = match build_advertisement(&*router, &self.config).await {
            Ok(adv) => adv,
            Err(e) => {
                warn!("Skipping advertisement: can't list registrations: {}", e);
                return None;
            }
        };

        let payload = adv.encode();
        if payload.len() > MAX_DATAGRAM_SIZE {
            warn!(
                "Advertisement is {} bytes, larger than one datagram; sends will fail",
                payload.len()
            );
        }
        debug!("Advertising {} routes:\n{}", adv.routes.len(), String::from_utf8_lossy(&payload));

        let mut sent = 0;
        for dest in &self.config.destinations {
            match self.sockets.send_to(&payload, *dest).await {
                Ok(_) => {
                    trace!("Sent advertisement to {}", dest);
                    sent += 1;
                }
                Err(e) => warn!("Error sending advertisement to {}: {}", dest, e),
            }
        }

        let reaped = match router.reap(now).await {
            Ok(reaped) => reaped,
            Err(e) => {
                warn!("Route expiry interrupted: {}", e);
                Vec::new()
            }
        };

        Some(TickReport {
            routes: adv.routes.len(),
            sent,
            reaped,
        })
    }

    /// Ticks every interval until cancelled
    ///
    /// The first advertisement goes out one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Don't fire immediately
        interval.tick().await;

        info!(
            "Advertising every {}s to {:?}",
            self.config.interval.as_secs(),
            self.config.destinations
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Advertiser shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(Instant::now()).await;
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouterConfig;
    use crate::testing::MockDaemon;

    fn router_with(registrations: &[&str]) -> Router<MockDaemon> {
        let daemon = MockDaemon::with_identity("dtn://node1", 4556);
        daemon.set_registrations(registrations.iter().map(|r| r.to_string()).collect());
        Router::new(daemon, RouterConfig::new("dtn://node1"))
    }

    #[tokio::test]
    async fn test_build_advertisement_local_wildcard_covers_registrations() {
        let router = router_with(&["dtn://node1", "dtn://node1/ping", "dtn://other/app"]);
        let config = AdvertiserConfig::new(4556, vec![]);

        let adv = build_advertisement(&router, &config).await.unwrap();
        assert_eq!(adv.sender_eid, "dtn://node1");
        assert_eq!(adv.listen_port, 4556);
        assert_eq!(
            adv.routes,
            vec![
                AdvertisedRoute::new("dtn://node1/*", 0, "dtn://node1"),
                AdvertisedRoute::new("dtn://other/app", 0, "dtn://node1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_build_advertisement_without_wildcard() {
        let router = router_with(&["dtn://node1/ping", "dtn://node1/ping"]);
        let mut config = AdvertiserConfig::new(4556, vec![]);
        config.advertise_local_wildcard = false;

        let adv = build_advertisement(&router, &config).await.unwrap();
        assert_eq!(
            adv.routes,
            vec![AdvertisedRoute::new("dtn://node1/ping", 0, "dtn://node1")]
        );
    }

    #[tokio::test]
    async fn test_build_advertisement_rebroadcasts_rib() {
        let daemon = MockDaemon::with_identity("dtn://node1", 4556);
        let mut router = Router::new(daemon, RouterConfig::new("dtn://node1"));
        let route = AdvertisedRoute::new("dtn://far", 1, "dtn://peer");
        router
            .process_route("dtn://peer", "10.0.0.2", 4556, &route, Instant::now())
            .await
            .unwrap();

        let mut config = AdvertiserConfig::new(4556, vec![]);
        config.rebroadcast_routes = true;
        let adv = build_advertisement(&router, &config).await.unwrap();
        assert_eq!(
            adv.routes.last(),
            Some(&AdvertisedRoute::new("dtn://far", 2, "dtn://peer"))
        );

        config.rebroadcast_routes = false;
        let adv = build_advertisement(&router, &config).await.unwrap();
        assert!(adv.routes.iter().all(|r| r.destination != "dtn://far"));
    }

    #[tokio::test]
    async fn test_tick_skipped_when_daemon_unreachable() {
        let router = router_with(&[]);
        router.daemon().set_unreachable(true);
        let sockets = SendSockets::new(&[], 1).unwrap();
        let advertiser = Advertiser::new(
            router.into_shared(),
            sockets,
            AdvertiserConfig::new(4556, vec![]),
        );

        assert_eq!(advertiser.tick(Instant::now()).await, None);
    }
}
