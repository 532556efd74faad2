// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Route acceptance, link management and expiry
//!
//! [`Router`] owns the RIB and the daemon client. Every decision re-reads
//! the daemon's live route table instead of trusting the RIB, so the two
//! may briefly disagree and converge on the next advertisement or reap.
//!
//! # Acceptance
//! For a triple `(dest, d, nh)` from `sender`:
//! 1. `nh` equal to the local EID is dropped (split horizon)
//! 2. the offered distance is `d + 1`, capped at the unreachable distance
//! 3. if the daemon already has a non-default route covering `dest` and
//!    the RIB distance is no worse, the route is kept; an exact RIB entry
//!    learned from the same sender is refreshed
//! 4. otherwise the old route and RIB entry are dropped, default-link
//!    routes for `dest` are retracted, and a route over a link to the
//!    sender is installed and recorded
//!
//! Destinations covered by a local registration are never routed.

use crate::advertisement::{Advertisement, AdvertisedRoute, UNREACHABLE_DISTANCE};
use crate::config::DefaultRoute;
use crate::console::{LinkInfo, RoutingDaemon};
use crate::eid;
use crate::error::ConsoleError;
use crate::rib::{NO_ENTRY_DISTANCE, Rib, RibEntry};
use log::{debug, info, trace, warn};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Prefix of link names created by this daemon
pub const LINK_PREFIX: &str = "dnd_";

/// Number of random characters after [`LINK_PREFIX`]
pub const LINK_SUFFIX_LEN: usize = 4;

/// Name of the link that carries default routes
pub const DEFAULT_LINK: &str = "default";

/// Default age after which a RIB entry is reaped
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(25);

/// Settings the router needs at runtime
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// This node's EID
    pub local_eid: String,
    /// Link name identifying default-carrying routes
    pub default_link: String,
    /// Statically configured fallback routes
    pub default_routes: Vec<DefaultRoute>,
    /// Age after which a RIB entry is reaped
    pub route_timeout: Duration,
}

impl RouterConfig {
    pub fn new(local_eid: impl Into<String>) -> Self {
        Self {
            local_eid: local_eid.into(),
            default_link: DEFAULT_LINK.to_string(),
            default_routes: Vec::new(),
            route_timeout: DEFAULT_ROUTE_TIMEOUT,
        }
    }
}

/// Outcome of processing one advertised route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The route's next hop is this node
    SplitHorizon,
    /// The destination is one of this node's own registrations
    LocalRegistration,
    /// Unreachable destination with nothing to withdraw
    Unreachable,
    /// The current route is as good or better
    Kept {
        /// Whether the RIB entry's distance and timestamp were refreshed
        refreshed: bool,
    },
    /// A new route was installed over `link`
    Installed { link: String },
}

/// The router as shared between the listeners and the advertiser
///
/// Holding this lock serializes all RIB and daemon route-table changes.
pub type SharedRouter<D> = Arc<Mutex<Router<D>>>;

/// The acceptance engine, RIB and daemon client behind the shared lock
#[derive(Debug)]
pub struct Router<D> {
    daemon: D,
    rib: Rib,
    config: RouterConfig,
}

impl<D: RoutingDaemon> Router<D> {
    /// Creates a router with an empty RIB
    pub fn new(daemon: D, config: RouterConfig) -> Self {
        Self {
            daemon,
            rib: Rib::new(),
            config,
        }
    }

    /// Wraps the router in the process-wide lock
    pub fn into_shared(self) -> SharedRouter<D> {
        Arc::new(Mutex::new(self))
    }

    pub fn rib(&self) -> &Rib {
        &self.rib
    }

    pub fn daemon(&self) -> &D {
        &self.daemon
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn local_eid(&self) -> &str {
        &self.config.local_eid
    }

    /// Processes every route in a received advertisement
    ///
    /// Advertisements sent by this node are ignored as a whole. A console
    /// failure aborts the rest of the advertisement; the routes already
    /// processed stay applied.
    pub async fn process_advertisement(
        &mut self,
        adv: &Advertisement,
        source: IpAddr,
        now: Instant,
    ) -> Result<Vec<Decision>, ConsoleError> {
        if adv.sender_eid == self.config.local_eid {
            trace!("ignoring own advertisement from {}", source);
            return Ok(Vec::new());
        }

        debug!(
            "advertisement from {} ({}:{}) with {} routes",
            adv.sender_eid,
            source,
            adv.listen_port,
            adv.routes.len()
        );

        let host = source.to_string();
        let mut decisions = Vec::with_capacity(adv.routes.len());
        for route in &adv.routes {
            let decision = self
                .process_route(&adv.sender_eid, &host, adv.listen_port, route, now)
                .await?;
            trace!("{} from {}: {:?}", route.destination, adv.sender_eid, decision);
            decisions.push(decision);
        }

        debug!("RIB after advertisement from {}:\n{}", adv.sender_eid, self.rib);
        Ok(decisions)
    }

    /// Applies the acceptance rule to one advertised route
    pub async fn process_route(
        &mut self,
        sender_eid: &str,
        sender_host: &str,
        sender_port: u16,
        route: &AdvertisedRoute,
        now: Instant,
    ) -> Result<Decision, ConsoleError> {
        if route.next_hop_eid == self.config.local_eid {
            trace!("split horizon: dropping {} via {}", route.destination, sender_eid);
            return Ok(Decision::SplitHorizon);
        }

        let dest = route.destination.as_str();
        let distance = route
            .distance
            .saturating_add(1)
            .min(UNREACHABLE_DISTANCE);
        let my_distance = self.rib.current_distance_to(dest);

        if my_distance == NO_ENTRY_DISTANCE && distance >= UNREACHABLE_DISTANCE {
            return Ok(Decision::Unreachable);
        }

        let routes = self.daemon.routes().await?;
        let daemon_has_route = routes.iter().any(|r| {
            r.link != self.config.default_link && eid::matches(&r.destination, dest)
        });

        if daemon_has_route && my_distance <= distance {
            let same_next_hop = self
                .rib
                .get(dest)
                .is_some_and(|e| e.next_hop_eid == sender_eid);
            let refreshed = same_next_hop && self.rib.refresh(dest, distance, now);
            debug!(
                "keeping route to {} (distance {} <= {}, refreshed: {})",
                dest, my_distance, distance, refreshed
            );
            return Ok(Decision::Kept { refreshed });
        }

        if self.has_registration_for(dest).await? {
            debug!("not routing {}: covered by a local registration", dest);
            return Ok(Decision::LocalRegistration);
        }

        if my_distance < NO_ENTRY_DISTANCE {
            self.daemon.del_route(dest).await?;
            if let Some(old) = self.rib.remove(dest) {
                info!(
                    "replacing route to {} via {} (distance {}) with {} (distance {})",
                    dest, old.next_hop_eid, old.distance, sender_eid, distance
                );
            }
        }

        self.remove_default_routes_for(dest).await?;

        // A route the RIB does not know about still blocks the add
        let routes = self.daemon.routes().await?;
        if routes.iter().any(|r| r.destination == dest) {
            self.daemon.del_route(dest).await?;
        }

        let link = self.find_or_create_link(sender_host, sender_port).await?;
        self.daemon.add_route(dest, &link).await?;
        info!(
            "route add {} via {} ({}:{}) link {} distance {}",
            dest, sender_eid, sender_host, sender_port, link, distance
        );

        self.rib.upsert(RibEntry {
            next_hop_host: sender_host.to_string(),
            next_hop_port: sender_port,
            destination: dest.to_string(),
            distance,
            last_update: now,
            link_name: link.clone(),
            next_hop_eid: sender_eid.to_string(),
        });

        Ok(Decision::Installed { link })
    }

    /// Returns true if `dest` is covered by this node's own endpoints
    pub async fn has_registration_for(&self, dest: &str) -> Result<bool, ConsoleError> {
        let local = &self.config.local_eid;
        if dest == local || eid::matches(&eid::node_wildcard(local), dest) {
            return Ok(true);
        }

        let registrations = self.daemon.registrations().await?;
        Ok(registrations
            .iter()
            .any(|reg| eid::matches(reg, dest) || eid::matches(&eid::node_wildcard(reg), dest)))
    }

    /// Returns the name of a link to `host:port`, creating one if needed
    ///
    /// A link bound to exactly `host:port` is reused; failing that, an
    /// opportunistic link to the same host is reused.
    pub async fn find_or_create_link(&self, host: &str, port: u16) -> Result<String, ConsoleError> {
        let links = self.daemon.links().await?;
        let target = format!("{}:{}", host, port);

        if let Some(link) = links.iter().find(|l| l.next_hop == target) {
            debug!("reusing link {} to {}", link.name, target);
            return Ok(link.name.clone());
        }
        if let Some(link) = links.iter().find(|l| l.opportunistic && l.host() == host) {
            debug!("reusing opportunistic link {} to {}", link.name, host);
            return Ok(link.name.clone());
        }

        let name = generate_link_name(&links);
        self.daemon.add_link(&name, host, port).await?;
        info!("link add {} {} ONDEMAND tcp", name, target);
        Ok(name)
    }

    /// Deletes the route for `destination`, restoring any default route it
    /// shadowed
    ///
    /// Returns true if a default route was restored.
    pub async fn retract_route(&self, destination: &str) -> Result<bool, ConsoleError> {
        self.daemon.del_route(destination).await?;
        self.restore_defaults_for(destination).await
    }

    /// Reinstalls configured default routes under `destination` that
    /// nothing covers
    async fn restore_defaults_for(&self, destination: &str) -> Result<bool, ConsoleError> {
        let candidates: Vec<&DefaultRoute> = self
            .config
            .default_routes
            .iter()
            .filter(|d| eid::matches(destination, &d.eid))
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        let routes = self.daemon.routes().await?;
        let mut restored = false;
        for default in candidates {
            if routes.iter().any(|r| eid::matches(&r.destination, &default.eid)) {
                continue;
            }
            self.daemon.add_route(&default.eid, &default.link).await?;
            info!("restored default route {} via {}", default.eid, default.link);
            restored = true;
        }
        Ok(restored)
    }

    /// Deletes default-link routes that a learned route for `destination`
    /// supersedes
    ///
    /// Returns the number of routes deleted.
    pub async fn remove_default_routes_for(&self, destination: &str) -> Result<usize, ConsoleError> {
        let routes = self.daemon.routes().await?;
        let mut removed = 0;
        for route in routes.iter().filter(|r| {
            r.link == self.config.default_link && eid::matches(destination, &r.destination)
        }) {
            self.daemon.del_route(&route.destination).await?;
            info!(
                "removed default route {} in favour of learned route {}",
                route.destination, destination
            );
            removed += 1;
        }
        Ok(removed)
    }

    /// Installs every configured default route not already covered
    pub async fn install_default_routes(&self) -> Result<usize, ConsoleError> {
        let routes = self.daemon.routes().await?;
        let mut installed = 0;
        for default in &self.config.default_routes {
            if routes.iter().any(|r| eid::matches(&r.destination, &default.eid)) {
                debug!("default route {} already covered", default.eid);
                continue;
            }
            self.daemon.add_route(&default.eid, &default.link).await?;
            info!("installed default route {} via {}", default.eid, default.link);
            installed += 1;
        }
        Ok(installed)
    }

    /// Deletes every route in the daemon's table
    pub async fn remove_existing_routes(&self) -> Result<usize, ConsoleError> {
        remove_all_routes(&self.daemon).await
    }

    /// Expires RIB entries older than the route timeout
    ///
    /// Each expired entry's daemon route is retracted. Entries at the
    /// unreachable distance are deleted; others keep their RIB entry with
    /// a reset timestamp until a fresh advertisement replaces them.
    /// Returns the expired destinations.
    pub async fn reap(&mut self, now: Instant) -> Result<Vec<String>, ConsoleError> {
        let mut reaped = Vec::new();

        loop {
            let expired = self.rib.expired(now, self.config.route_timeout);
            if expired.is_empty() {
                break;
            }

            for entry in expired {
                info!(
                    "RIB entry {} via {} timed out after {}s",
                    entry.destination,
                    entry.next_hop_eid,
                    entry.age(now).as_secs()
                );
                self.retract_route(&entry.destination).await?;

                if entry.distance == UNREACHABLE_DISTANCE {
                    self.rib.remove(&entry.destination);
                } else {
                    self.rib.touch(&entry.destination, now);
                }
                reaped.push(entry.destination);
            }
        }

        if !reaped.is_empty() {
            debug!("RIB after reaping:\n{}", self.rib);
        }
        Ok(reaped)
    }
}

/// Deletes every route in `daemon`'s table
///
/// Returns the number of routes deleted.
pub async fn remove_all_routes<D: RoutingDaemon>(daemon: &D) -> Result<usize, ConsoleError> {
    let routes = daemon.routes().await?;
    for route in &routes {
        daemon.del_route(&route.destination).await?;
        debug!("route del {}", route.destination);
    }
    Ok(routes.len())
}

/// Generates a `dnd_XXXX` link name not used by any of `links`
pub fn generate_link_name(links: &[LinkInfo]) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(LINK_SUFFIX_LEN)
            .map(char::from)
            .collect();
        let name = format!("{}{}", LINK_PREFIX, suffix);
        if links.iter().all(|l| l.name != name) {
            return name;
        }
        warn!("generated link name {} already in use, retrying", name);
    }
}
