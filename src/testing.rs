// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! In-memory routing daemon
//!
//! [`MockDaemon`] keeps link, route and registration tables in memory and
//! records every mutating command in console syntax. Clones share state,
//! so a test can hand one clone to a [`Router`](crate::routing::Router)
//! and inspect the tables through another.

use crate::console::{LinkInfo, RouteInfo, RoutingDaemon};
use crate::error::ConsoleError;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    links: Vec<LinkInfo>,
    routes: Vec<RouteInfo>,
    registrations: Vec<String>,
    local_eid: Option<String>,
    listen_port: Option<u16>,
    commands: Vec<String>,
    unreachable: bool,
}

/// Routing daemon double backed by in-memory tables
#[derive(Debug, Clone, Default)]
pub struct MockDaemon {
    state: Arc<Mutex<MockState>>,
}

impl MockDaemon {
    /// Creates a daemon with empty tables and no identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a daemon reporting the given local EID and TCP listen port
    pub fn with_identity(local_eid: &str, listen_port: u16) -> Self {
        let daemon = Self::new();
        {
            let mut state = daemon.state();
            state.local_eid = Some(local_eid.to_string());
            state.listen_port = Some(listen_port);
            state.registrations.push(local_eid.to_string());
        }
        daemon
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the tables from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_reachable(&self, command: &str) -> Result<(), ConsoleError> {
        if self.state().unreachable {
            return Err(ConsoleError::Unreachable {
                addr: format!("mock ({})", command),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn set_local_eid(&self, local_eid: Option<&str>) {
        self.state().local_eid = local_eid.map(str::to_string);
    }

    pub fn set_listen_port(&self, listen_port: Option<u16>) {
        self.state().listen_port = listen_port;
    }

    pub fn set_links(&self, links: Vec<LinkInfo>) {
        self.state().links = links;
    }

    pub fn set_registrations(&self, registrations: Vec<String>) {
        self.state().registrations = registrations;
    }

    /// Adds a registration without recording a command
    pub fn register(&self, endpoint: &str) {
        self.state().registrations.push(endpoint.to_string());
    }

    /// Adds a route without recording a command
    pub fn add_existing_route(&self, destination: &str, link: &str) {
        self.state().routes.push(RouteInfo {
            destination: destination.to_string(),
            link: link.to_string(),
            next_hop: None,
        });
    }

    /// Current route table
    pub fn route_table(&self) -> Vec<RouteInfo> {
        self.state().routes.clone()
    }

    /// Current link table
    pub fn link_table(&self) -> Vec<LinkInfo> {
        self.state().links.clone()
    }

    /// Returns the link of the route for exactly `destination`
    pub fn route_link(&self, destination: &str) -> Option<String> {
        self.state()
            .routes
            .iter()
            .find(|r| r.destination == destination)
            .map(|r| r.link.clone())
    }

    /// Mutating commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }
}

impl RoutingDaemon for MockDaemon {
    async fn links(&self) -> Result<Vec<LinkInfo>, ConsoleError> {
        self.check_reachable("link dump")?;
        Ok(self.state().links.clone())
    }

    async fn routes(&self) -> Result<Vec<RouteInfo>, ConsoleError> {
        self.check_reachable("route dump")?;
        let state = self.state();
        Ok(state
            .routes
            .iter()
            .map(|r| RouteInfo {
                next_hop: state
                    .links
                    .iter()
                    .find(|l| l.name == r.link)
                    .map(|l| l.next_hop.clone()),
                ..r.clone()
            })
            .collect())
    }

    async fn registrations(&self) -> Result<Vec<String>, ConsoleError> {
        self.check_reachable("registration list")?;
        Ok(self.state().registrations.clone())
    }

    async fn local_eid(&self) -> Result<Option<String>, ConsoleError> {
        self.check_reachable("registration dump")?;
        Ok(self.state().local_eid.clone())
    }

    async fn listen_port(&self) -> Result<Option<u16>, ConsoleError> {
        self.check_reachable("interface list")?;
        Ok(self.state().listen_port)
    }

    async fn add_link(&self, name: &str, host: &str, port: u16) -> Result<(), ConsoleError> {
        let command = format!("link add {} {}:{} ONDEMAND tcp", name, host, port);
        self.check_reachable(&command)?;
        let mut state = self.state();
        state.links.push(LinkInfo {
            name: name.to_string(),
            next_hop: format!("{}:{}", host, port),
            link_type: "ONDEMAND".to_string(),
            opportunistic: false,
        });
        state.commands.push(command);
        Ok(())
    }

    async fn add_route(&self, eid: &str, link: &str) -> Result<(), ConsoleError> {
        let command = format!("route add {} {}", eid, link);
        self.check_reachable(&command)?;
        let mut state = self.state();
        state.routes.push(RouteInfo {
            destination: eid.to_string(),
            link: link.to_string(),
            next_hop: None,
        });
        state.commands.push(command);
        Ok(())
    }

    async fn del_route(&self, eid: &str) -> Result<(), ConsoleError> {
        let command = format!("route del {}", eid);
        self.check_reachable(&command)?;
        let mut state = self.state();
        state.routes.retain(|r| r.destination != eid);
        state.commands.push(command);
        Ok(())
    }
}
