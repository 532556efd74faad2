// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Configuration management for the discovery daemon
//!
//! Supports both command-line arguments and TOML configuration files.
//! Values given on the command line override values from the file.

use crate::advertisement::DEFAULT_PORT;
use crate::console::{DEFAULT_CONSOLE_PORT, DEFAULT_TIMEOUT_MS};
use crate::routing::DEFAULT_LINK;
use crate::shim::DEFAULT_MULTICAST_TTL;
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

/// Which halves of the daemon run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Listen for and send advertisements
    #[default]
    Both,
    /// Only listen for advertisements
    Server,
    /// Only send advertisements
    Client,
}

impl RunMode {
    pub fn listens(&self) -> bool {
        matches!(self, RunMode::Both | RunMode::Server)
    }

    pub fn advertises(&self) -> bool {
        matches!(self, RunMode::Both | RunMode::Client)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Both => write!(f, "both"),
            RunMode::Server => write!(f, "server"),
            RunMode::Client => write!(f, "client"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "both" => Ok(RunMode::Both),
            "server" => Ok(RunMode::Server),
            "client" => Ok(RunMode::Client),
            _ => Err(format!(
                "Invalid mode: {}. Use 'both', 'server', or 'client'",
                s
            )),
        }
    }
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "dnd")]
#[command(author = "DND Contributors")]
#[command(version = "0.1.0")]
#[command(about = "DTN neighbor discovery and route propagation daemon", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only listen for advertisements
    #[arg(short = 's', long)]
    pub server_only: bool,

    /// Only send advertisements
    #[arg(short = 'c', long)]
    pub client_only: bool,

    /// Routing daemon console port
    #[arg(short = 't', long, value_name = "PORT")]
    pub console_port: Option<u16>,

    /// Listen socket: "port" or "intf,addr[:port]" (repeatable)
    #[arg(short = 'L', long = "listen", value_name = "SPEC")]
    pub listen: Vec<String>,

    /// Multicast TTL
    #[arg(short = 'd', long, value_name = "TTL")]
    pub multicast_ttl: Option<u32>,

    /// Interface address to send multicast advertisements from (repeatable)
    #[arg(short = 'm', long = "multicast-interface", value_name = "ADDR")]
    pub multicast_interfaces: Vec<Ipv4Addr>,

    /// Also advertise learned routes
    #[arg(short = 'r', long)]
    pub rebroadcast: bool,

    /// Default UDP port for listen specs and destinations
    #[arg(short = 'b', long, value_name = "PORT")]
    pub send_port: Option<u16>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Remove every route from the routing daemon and exit
    #[arg(short = 'R', long)]
    pub remove_routes: bool,

    /// Advertisement destinations: "addr[:port]"
    #[arg(value_name = "ADDR[:PORT]")]
    pub destinations: Vec<String>,
}

/// A socket to listen for advertisements on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSpec {
    /// Local interface address used for multicast membership
    pub interface: Ipv4Addr,
    /// Address to bind, or multicast group to join
    pub address: Ipv4Addr,
    pub port: u16,
}

impl ListenSpec {
    pub fn new(interface: Ipv4Addr, address: Ipv4Addr, port: u16) -> Self {
        Self {
            interface,
            address,
            port,
        }
    }

    /// Listens on every interface
    pub fn any(port: u16) -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED, port)
    }

    /// Parses `port`, `addr[:port]` or `intf,addr[:port]`
    pub fn parse(spec: &str, default_port: u16) -> Result<Self, String> {
        let spec = spec.trim();

        if let Ok(port) = spec.parse::<u16>() {
            return Ok(Self::any(port));
        }

        let (head, port) = match spec.rsplit_once(':') {
            Some((head, port)) => (
                head,
                port.parse::<u16>()
                    .map_err(|_| format!("Invalid port in listen spec '{}'", spec))?,
            ),
            None => (spec, default_port),
        };

        let parse_addr = |s: &str| {
            s.trim()
                .parse::<Ipv4Addr>()
                .map_err(|_| format!("Invalid address '{}' in listen spec '{}'", s, spec))
        };

        match head.split_once(',') {
            Some((interface, address)) => Ok(Self::new(
                parse_addr(interface)?,
                parse_addr(address)?,
                port,
            )),
            None => Ok(Self::new(Ipv4Addr::UNSPECIFIED, parse_addr(head)?, port)),
        }
    }
}

impl std::fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}:{}", self.interface, self.address, self.port)
    }
}

/// Parses an advertisement destination `addr[:port]`
pub fn parse_destination(dest: &str, default_port: u16) -> Result<SocketAddrV4, String> {
    let dest = dest.trim();
    if let Ok(addr) = dest.parse::<SocketAddrV4>() {
        return Ok(addr);
    }
    dest.parse::<Ipv4Addr>()
        .map(|ip| SocketAddrV4::new(ip, default_port))
        .map_err(|_| format!("Invalid destination '{}': expected addr[:port]", dest))
}

/// A statically configured fallback route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoute {
    /// Destination EID pattern
    pub eid: String,
    /// Link (or next-hop EID) the route forwards over
    #[serde(default = "default_link_name")]
    pub link: String,
}

impl DefaultRoute {
    pub fn new(eid: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            eid: eid.into(),
            link: link.into(),
        }
    }
}

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Console section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_console_host")]
    pub host: String,
    #[serde(default = "default_console_port")]
    pub port: u16,
    /// Bound on each console exchange in milliseconds
    #[serde(default = "default_console_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_console_host() -> String {
    "127.0.0.1".to_string()
}

fn default_console_port() -> u16 {
    DEFAULT_CONSOLE_PORT
}

fn default_console_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: default_console_host(),
            port: default_console_port(),
            timeout_ms: default_console_timeout_ms(),
        }
    }
}

/// Discovery section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub mode: RunMode,
    /// Listen specs, same syntax as `-L`
    #[serde(default)]
    pub listen: Vec<String>,
    /// Destinations, same syntax as the positional arguments
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default = "default_send_port")]
    pub send_port: u16,
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,
    #[serde(default)]
    pub multicast_interfaces: Vec<Ipv4Addr>,
    #[serde(default = "default_broadcast_interval_secs")]
    pub broadcast_interval_secs: u64,
    /// Age after which a learned route is withdrawn
    #[serde(default = "default_route_timeout_secs")]
    pub route_timeout_secs: u64,
    /// Advertise `<local EID>/*` at distance 0
    #[serde(default = "default_true")]
    pub advertise_local_wildcard: bool,
    /// Also advertise learned routes
    #[serde(default)]
    pub rebroadcast_routes: bool,
}

fn default_send_port() -> u16 {
    DEFAULT_PORT
}

fn default_multicast_ttl() -> u32 {
    DEFAULT_MULTICAST_TTL
}

fn default_broadcast_interval_secs() -> u64 {
    10
}

fn default_route_timeout_secs() -> u64 {
    25
}

fn default_true() -> bool {
    true
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            listen: Vec::new(),
            destinations: Vec::new(),
            send_port: default_send_port(),
            multicast_ttl: default_multicast_ttl(),
            multicast_interfaces: Vec::new(),
            broadcast_interval_secs: default_broadcast_interval_secs(),
            route_timeout_secs: default_route_timeout_secs(),
            advertise_local_wildcard: default_true(),
            rebroadcast_routes: false,
        }
    }
}

/// Routing section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Link name that marks a route as a default route
    #[serde(default = "default_link_name")]
    pub default_link: String,
    #[serde(default)]
    pub default_routes: Vec<DefaultRoute>,
}

fn default_link_name() -> String {
    DEFAULT_LINK.to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_link: default_link_name(),
            default_routes: Vec::new(),
        }
    }
}

/// Unified configuration after parsing CLI and file
#[derive(Debug, Clone)]
pub struct DndConfiguration {
    pub mode: RunMode,
    pub console_host: String,
    pub console_port: u16,
    pub console_timeout: Duration,
    pub listen: Vec<ListenSpec>,
    /// Empty means the first local broadcast address
    pub destinations: Vec<SocketAddrV4>,
    pub send_port: u16,
    pub multicast_ttl: u32,
    pub multicast_interfaces: Vec<Ipv4Addr>,
    pub broadcast_interval: Duration,
    pub route_timeout: Duration,
    pub advertise_local_wildcard: bool,
    pub rebroadcast_routes: bool,
    pub default_link: String,
    pub default_routes: Vec<DefaultRoute>,
    pub remove_routes: bool,
    pub verbosity: u8,
}

impl DndConfiguration {
    /// Creates configuration from command-line arguments
    ///
    /// Loads the file named by `--config` first, if any.
    pub fn from_cli(args: CliArgs) -> Result<Self, String> {
        let file = match &args.config {
            Some(path) => Self::load_file(path)?,
            None => TomlConfig::default(),
        };
        Self::merge(file, args)
    }

    fn load_file(path: &PathBuf) -> Result<TomlConfig, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;
        toml::from_str(&contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
    }

    fn merge(file: TomlConfig, args: CliArgs) -> Result<Self, String> {
        let mode = match (args.server_only, args.client_only) {
            (true, true) => return Err("-s and -c are mutually exclusive".to_string()),
            (true, false) => RunMode::Server,
            (false, true) => RunMode::Client,
            (false, false) => file.discovery.mode,
        };

        let send_port = args.send_port.unwrap_or(file.discovery.send_port);

        let listen_specs = if args.listen.is_empty() {
            &file.discovery.listen
        } else {
            &args.listen
        };
        let mut listen = listen_specs
            .iter()
            .map(|s| ListenSpec::parse(s, send_port))
            .collect::<Result<Vec<_>, _>>()?;
        if listen.is_empty() {
            listen.push(ListenSpec::any(send_port));
        }

        let destination_specs = if args.destinations.is_empty() {
            &file.discovery.destinations
        } else {
            &args.destinations
        };
        let destinations = destination_specs
            .iter()
            .map(|d| parse_destination(d, send_port))
            .collect::<Result<Vec<_>, _>>()?;

        let multicast_interfaces = if args.multicast_interfaces.is_empty() {
            file.discovery.multicast_interfaces
        } else {
            args.multicast_interfaces
        };

        Ok(Self {
            mode,
            console_host: file.console.host,
            console_port: args.console_port.unwrap_or(file.console.port),
            console_timeout: Duration::from_millis(file.console.timeout_ms),
            listen,
            destinations,
            send_port,
            multicast_ttl: args.multicast_ttl.unwrap_or(file.discovery.multicast_ttl),
            multicast_interfaces,
            broadcast_interval: Duration::from_secs(file.discovery.broadcast_interval_secs),
            route_timeout: Duration::from_secs(file.discovery.route_timeout_secs),
            advertise_local_wildcard: file.discovery.advertise_local_wildcard,
            rebroadcast_routes: args.rebroadcast || file.discovery.rebroadcast_routes,
            default_link: file.routing.default_link,
            default_routes: file.routing.default_routes,
            remove_routes: args.remove_routes,
            verbosity: args.verbose,
        })
    }

    /// Validates configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.multicast_ttl == 0 || self.multicast_ttl > 255 {
            return Err(format!(
                "Multicast TTL must be between 1 and 255, got {}",
                self.multicast_ttl
            ));
        }
        if self.broadcast_interval.is_zero() {
            return Err("Broadcast interval must be positive".to_string());
        }
        if self.route_timeout.is_zero() {
            return Err("Route timeout must be positive".to_string());
        }
        if self.console_timeout.is_zero() {
            return Err("Console timeout must be positive".to_string());
        }
        if self.default_routes.iter().any(|r| r.eid.trim().is_empty()) {
            return Err("Default routes need a non-empty EID".to_string());
        }
        Ok(())
    }

    /// Logs a configuration summary
    pub fn log_summary(&self) {
        info!("=== DND Configuration ===");
        info!("Mode: {}", self.mode);
        info!("Console: {}:{}", self.console_host, self.console_port);
        if self.mode.listens() {
            for spec in &self.listen {
                info!("Listen: {}", spec);
            }
        }
        if self.mode.advertises() {
            if self.destinations.is_empty() {
                info!("Destinations: local broadcast, port {}", self.send_port);
            } else {
                info!("Destinations: {:?}", self.destinations);
            }
            if !self.multicast_interfaces.is_empty() {
                info!("Multicast interfaces: {:?}", self.multicast_interfaces);
            }
            info!(
                "Interval: {}s, rebroadcast routes: {}",
                self.broadcast_interval.as_secs(),
                self.rebroadcast_routes
            );
        }
        info!("Route timeout: {}s", self.route_timeout.as_secs());
        for route in &self.default_routes {
            info!("Default route: {} via {}", route.eid, route.link);
        }
    }
}
