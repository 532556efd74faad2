// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Daemon startup and shutdown
//!
//! Startup order: learn the local EID and TCP listen port from the routing
//! daemon (both required), clear its route table, install default routes,
//! then start the listeners and the advertiser. Everything stops when the
//! cancellation token fires.

use crate::advertiser::{Advertiser, AdvertiserConfig};
use crate::config::DndConfiguration;
use crate::console::{ConsoleClient, RoutingDaemon};
use crate::error::DndError;
use crate::listener::Listener;
use crate::netif;
use crate::routing::{Router, RouterConfig, SharedRouter, remove_all_routes};
use crate::shim::{self, SendSockets};
use log::{error, info, warn};
use std::net::{SocketAddr, SocketAddrV4};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity of the local node as reported by the routing daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub local_eid: String,
    /// TCP convergence layer listen port
    pub listen_port: u16,
}

/// Queries the local EID and TCP listen port
pub async fn discover_identity<D: RoutingDaemon>(daemon: &D) -> Result<NodeIdentity, DndError> {
    let local_eid = daemon
        .local_eid()
        .await?
        .ok_or(DndError::LocalEidUnavailable)?;
    let listen_port = daemon
        .listen_port()
        .await?
        .ok_or(DndError::ListenPortUnavailable)?;

    info!("Local EID is {}, TCP CL listening on port {}", local_eid, listen_port);
    Ok(NodeIdentity {
        local_eid,
        listen_port,
    })
}

/// Resolves configured destinations, defaulting to the local broadcast address
pub fn resolve_destinations(config: &DndConfiguration) -> Result<Vec<SocketAddrV4>, DndError> {
    if !config.destinations.is_empty() {
        return Ok(config.destinations.clone());
    }

    let broadcast = netif::first_broadcast_address()
        .map_err(|e| DndError::Config(format!("Failed to list interfaces: {}", e)))?
        .ok_or_else(|| {
            DndError::Config(
                "No destinations given and no interface has a broadcast address".to_string(),
            )
        })?;
    Ok(vec![SocketAddrV4::new(broadcast, config.send_port)])
}

/// A started daemon
pub struct RunningDaemon<D> {
    pub router: SharedRouter<D>,
    pub identity: NodeIdentity,
    /// Bound addresses of the listeners, in listen-spec order
    pub listen_addrs: Vec<SocketAddr>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl<D> RunningDaemon<D> {
    /// Signals every task to stop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for every task to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Daemon task failed: {}", e);
            }
        }
    }
}

/// Initializes the routing daemon's tables and spawns the daemon tasks
///
/// `destinations` are where advertisements go; they are only used when
/// the configuration enables advertising.
pub async fn start<D: RoutingDaemon + 'static>(
    daemon: D,
    config: &DndConfiguration,
    destinations: Vec<SocketAddrV4>,
    cancel: CancellationToken,
) -> Result<RunningDaemon<D>, DndError> {
    let identity = discover_identity(&daemon).await?;

    let router = Router::new(
        daemon,
        RouterConfig {
            local_eid: identity.local_eid.clone(),
            default_link: config.default_link.clone(),
            default_routes: config.default_routes.clone(),
            route_timeout: config.route_timeout,
        },
    );

    let removed = router.remove_existing_routes().await?;
    info!("Removed {} existing routes", removed);
    let installed = router.install_default_routes().await?;
    info!("Installed {} default routes", installed);

    let router = router.into_shared();
    let mut handles = Vec::new();
    let mut listen_addrs = Vec::new();

    if config.mode.listens() {
        for spec in &config.listen {
            let socket = shim::bind_listener(spec, config.multicast_ttl)?;
            let listener = Listener::new(router.clone(), socket);
            if let Ok(addr) = listener.local_addr() {
                listen_addrs.push(addr);
            }
            handles.push(listener.spawn(cancel.clone()));
        }
    }

    if config.mode.advertises() {
        let sockets = SendSockets::new(&config.multicast_interfaces, config.multicast_ttl)?;
        let advertiser = Advertiser::new(
            router.clone(),
            sockets,
            AdvertiserConfig {
                listen_port: identity.listen_port,
                destinations,
                interval: config.broadcast_interval,
                advertise_local_wildcard: config.advertise_local_wildcard,
                rebroadcast_routes: config.rebroadcast_routes,
            },
        );
        handles.push(advertiser.spawn(cancel.clone()));
    }

    if handles.is_empty() {
        warn!("Nothing to run: no listeners and advertising disabled");
    }

    Ok(RunningDaemon {
        router,
        identity,
        listen_addrs,
        cancel,
        handles,
    })
}

/// Runs the daemon against the console named in `config` until cancelled
///
/// With `remove_routes` set, only clears the route table and returns.
pub async fn run(config: DndConfiguration, cancel: CancellationToken) -> Result<(), DndError> {
    let client = ConsoleClient::new(
        &config.console_host,
        config.console_port,
        config.console_timeout,
    );

    if config.remove_routes {
        let removed = remove_all_routes(&client).await?;
        info!("Removed {} routes", removed);
        return Ok(());
    }

    let destinations = if config.mode.advertises() {
        resolve_destinations(&config)?
    } else {
        Vec::new()
    };

    let running = start(client, &config, destinations, cancel).await?;
    running.join().await;
    info!("DND stopped");
    Ok(())
}
