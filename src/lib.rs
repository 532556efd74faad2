// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! The core library for the DTN neighbor discovery daemon.
//!
//! Nodes periodically advertise their registered endpoints over UDP.
//! Peers that hear an advertisement install routes to the advertised
//! endpoints in their local DTN routing daemon, through its text console,
//! and withdraw them again once the advertisements stop.

// Public module declarations
pub mod advertisement;
pub mod advertiser;
pub mod config;
pub mod console;
pub mod daemon;
pub mod eid;
pub mod error;
pub mod listener;
pub mod netif;
pub mod rib;
pub mod routing;
pub mod shim;
pub mod testing;

// Re-export commonly used types
pub use advertisement::{AdvertisedRoute, Advertisement, UNREACHABLE_DISTANCE};
pub use advertiser::{Advertiser, AdvertiserConfig, TickReport};
pub use config::{CliArgs, DefaultRoute, DndConfiguration, ListenSpec, RunMode};
pub use console::{ConsoleClient, LinkInfo, RouteInfo, RoutingDaemon};
pub use daemon::{NodeIdentity, RunningDaemon};
pub use error::{AdvertisementError, ConsoleError, DndError, ShimError};
pub use listener::Listener;
pub use rib::{NO_ENTRY_DISTANCE, Rib, RibEntry};
pub use routing::{Decision, Router, RouterConfig, SharedRouter};
pub use shim::SendSockets;
