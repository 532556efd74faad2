// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Control channel to the routing daemon
//!
//! The routing daemon exposes a line-oriented text console on a local TCP
//! port. Every call here opens a connection, sends exactly one command,
//! reads until the second prompt, and closes. No call retries; a daemon
//! that cannot be reached yields [`ConsoleError::Unreachable`] or
//! [`ConsoleError::Timeout`] and the caller decides what to skip.
//!
//! The rest of the crate talks to the daemon only through the
//! [`RoutingDaemon`] trait so the routing logic can be driven by
//! [`MockDaemon`](crate::testing::MockDaemon) in tests.

pub mod parse;

use crate::error::ConsoleError;
use log::{debug, trace, warn};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Prompt printed by the console before and after each command
pub const PROMPT: &str = "dtn% ";

/// Default console port
pub const DEFAULT_CONSOLE_PORT: u16 = 5050;

/// Default bound on connect + command + response
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

const READ_CHUNK: usize = 4096;

/// A link known to the routing daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Link name
    pub name: String,
    /// Next hop the link is bound to, usually `host:port`
    pub next_hop: String,
    /// Link type as printed by the daemon (ONDEMAND, OPPORTUNISTIC, ...)
    pub link_type: String,
    /// Whether this is a best-effort opportunistic link
    pub opportunistic: bool,
}

impl LinkInfo {
    /// Host part of the next hop
    pub fn host(&self) -> &str {
        self.next_hop
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.next_hop)
    }
}

/// A route installed on the routing daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Destination EID pattern
    pub destination: String,
    /// Link (or EID) the route forwards over
    pub link: String,
    /// Next hop of the owning link, when the link is known
    pub next_hop: Option<String>,
}

/// Typed interface to the routing daemon
pub trait RoutingDaemon: Send + Sync {
    /// Lists current links
    fn links(&self) -> impl Future<Output = Result<Vec<LinkInfo>, ConsoleError>> + Send;

    /// Lists current routes
    fn routes(&self) -> impl Future<Output = Result<Vec<RouteInfo>, ConsoleError>> + Send;

    /// Lists local registration endpoint patterns
    fn registrations(&self) -> impl Future<Output = Result<Vec<String>, ConsoleError>> + Send;

    /// Returns the daemon's local EID, if it reports one
    fn local_eid(&self) -> impl Future<Output = Result<Option<String>, ConsoleError>> + Send;

    /// Returns the TCP convergence layer listen port, if one is configured
    fn listen_port(&self) -> impl Future<Output = Result<Option<u16>, ConsoleError>> + Send;

    /// Adds an on-demand TCP link to `host:port`
    fn add_link(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<(), ConsoleError>> + Send;

    /// Adds a route for `eid` over `link`
    fn add_route(&self, eid: &str, link: &str)
    -> impl Future<Output = Result<(), ConsoleError>> + Send;

    /// Deletes the route for `eid`
    fn del_route(&self, eid: &str) -> impl Future<Output = Result<(), ConsoleError>> + Send;
}

/// TCP console client
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    /// `host:port` of the console
    addr: String,
    /// Bound on each exchange
    timeout: Duration,
}

impl ConsoleClient {
    /// Creates a client for the console at `host:port`
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            timeout,
        }
    }

    /// Sends one command and returns the response text
    ///
    /// The text returned is everything after the first prompt, with the
    /// closing prompt removed.
    pub async fn talk(&self, command: &str) -> Result<String, ConsoleError> {
        let command_name = command.trim_end().to_string();
        let millis = self.timeout.as_millis() as u64;

        let mut stream = match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConsoleError::Unreachable {
                    addr: self.addr.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConsoleError::Timeout {
                    command: command_name,
                    millis,
                });
            }
        };

        let exchange = async {
            let line = if command.ends_with('\n') {
                command.to_string()
            } else {
                format!("{}\n", command)
            };
            stream.write_all(line.as_bytes()).await?;
            read_until_second_prompt(&mut stream).await
        };

        let raw = match timeout(self.timeout, exchange).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(ConsoleError::Io {
                    command: command_name,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConsoleError::Timeout {
                    command: command_name,
                    millis,
                });
            }
        };

        trace!("console '{}' returned {} bytes", command_name, raw.len());
        if !raw.contains(PROMPT) {
            return Err(ConsoleError::Parse {
                command: command_name,
                reason: "no console prompt in response".to_string(),
            });
        }
        Ok(strip_prompts(&raw))
    }

    /// Sends a mutating command, logging any text the daemon answers with
    async fn command(&self, command: &str) -> Result<(), ConsoleError> {
        debug!("console: {}", command);
        let response = self.talk(command).await?;
        let response = response.trim();
        if !response.is_empty() {
            warn!("console '{}' answered: {}", command, response);
        }
        Ok(())
    }
}

async fn read_until_second_prompt(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut data = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        if String::from_utf8_lossy(&data).matches(PROMPT).count() >= 2 {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Removes everything up to and including the first prompt, and the
/// trailing prompt if present
pub fn strip_prompts(raw: &str) -> String {
    let Some(first) = raw.find(PROMPT) else {
        return String::new();
    };
    let body = &raw[first + PROMPT.len()..];
    let body = body.strip_suffix(PROMPT).unwrap_or(body);
    body.to_string()
}

impl RoutingDaemon for ConsoleClient {
    async fn links(&self) -> Result<Vec<LinkInfo>, ConsoleError> {
        let text = self.talk("link dump").await?;
        Ok(parse::parse_link_dump(&text))
    }

    async fn routes(&self) -> Result<Vec<RouteInfo>, ConsoleError> {
        let text = self.talk("route dump").await?;
        let mut routes = parse::parse_route_dump(&text);

        // Resolve next hops only when the link table is reachable
        if let Ok(links) = self.links().await {
            for route in &mut routes {
                route.next_hop = links
                    .iter()
                    .find(|l| l.name == route.link)
                    .map(|l| l.next_hop.clone());
            }
        }
        Ok(routes)
    }

    async fn registrations(&self) -> Result<Vec<String>, ConsoleError> {
        let text = self.talk("registration list").await?;
        Ok(parse::parse_registration_list(&text))
    }

    async fn local_eid(&self) -> Result<Option<String>, ConsoleError> {
        let text = self.talk("registration dump").await?;
        Ok(parse::parse_local_eid(&text))
    }

    async fn listen_port(&self) -> Result<Option<u16>, ConsoleError> {
        let text = self.talk("interface list").await?;
        Ok(parse::parse_listen_port(&text))
    }

    async fn add_link(&self, name: &str, host: &str, port: u16) -> Result<(), ConsoleError> {
        self.command(&format!("link add {} {}:{} ONDEMAND tcp", name, host, port))
            .await
    }

    async fn add_route(&self, eid: &str, link: &str) -> Result<(), ConsoleError> {
        self.command(&format!("route add {} {}", eid, link)).await
    }

    async fn del_route(&self, eid: &str) -> Result<(), ConsoleError> {
        self.command(&format!("route del {}", eid)).await
    }
}
