// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Shim Layer - UDP/IP sockets for advertisements
//!
//! Builds the listening sockets described by [`ListenSpec`]s and the
//! sockets advertisements are sent from. Multicast listen addresses get
//! a shared group socket bound to the wildcard address; anything else is
//! bound directly.

use crate::config::ListenSpec;
use crate::error::ShimError;
use log::{debug, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Default multicast TTL
pub const DEFAULT_MULTICAST_TTL: u32 = 5;

fn new_udp_socket() -> Result<Socket, ShimError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| ShimError::IoError(format!("Failed to create UDP socket: {}", e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ShimError::IoError(format!("Failed to set non-blocking: {}", e)))?;
    Ok(socket)
}

fn set_reuse(socket: &Socket) {
    // Some platforms refuse SO_REUSEPORT; binding may still succeed
    if let Err(e) = socket.set_reuse_address(true) {
        warn!("Can't set SO_REUSEADDR: {}", e);
    }
    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        warn!("Can't set SO_REUSEPORT: {}", e);
    }
}

fn into_tokio(socket: Socket) -> Result<UdpSocket, ShimError> {
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
        .map_err(|e| ShimError::IoError(format!("Failed to register socket with runtime: {}", e)))
}

/// Creates the socket a listener receives advertisements on
pub fn bind_listener(spec: &ListenSpec, multicast_ttl: u32) -> Result<UdpSocket, ShimError> {
    let socket = new_udp_socket()?;

    if spec.address.is_multicast() {
        set_reuse(&socket);
        socket
            .set_multicast_ttl_v4(multicast_ttl)
            .map_err(|e| ShimError::MulticastSetup(format!("IP_MULTICAST_TTL: {}", e)))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| ShimError::MulticastSetup(format!("IP_MULTICAST_LOOP: {}", e)))?;

        let group = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, spec.port);
        socket
            .bind(&SockAddr::from(group))
            .map_err(|e| ShimError::BindFailed(format!("Failed to bind to {}: {}", group, e)))?;

        socket.set_multicast_if_v4(&spec.interface).map_err(|e| {
            ShimError::MulticastSetup(format!("IP_MULTICAST_IF on {}: {}", spec.interface, e))
        })?;
        socket
            .join_multicast_v4(&spec.address, &spec.interface)
            .map_err(|e| {
                ShimError::MulticastSetup(format!(
                    "IP_ADD_MEMBERSHIP for {} on {}: {}",
                    spec.address, spec.interface, e
                ))
            })?;

        info!(
            "Listening for multicast {}:{} on interface {}",
            spec.address, spec.port, spec.interface
        );
    } else {
        let addr = SocketAddrV4::new(spec.address, spec.port);
        socket
            .bind(&SockAddr::from(addr))
            .map_err(|e| ShimError::BindFailed(format!("Failed to bind to {}: {}", addr, e)))?;
        info!("Listening on {}", addr);
    }

    into_tokio(socket)
}

/// Sockets advertisements are sent from
///
/// Broadcast and unicast destinations use the default socket. Multicast
/// destinations are sent once per configured multicast interface, or on
/// the default socket when none is configured.
#[derive(Debug)]
pub struct SendSockets {
    default: UdpSocket,
    multicast: Vec<(Ipv4Addr, UdpSocket)>,
}

impl SendSockets {
    /// Creates the send sockets
    pub fn new(multicast_interfaces: &[Ipv4Addr], multicast_ttl: u32) -> Result<Self, ShimError> {
        let default = Self::sender(None, multicast_ttl)?;
        let multicast = multicast_interfaces
            .iter()
            .map(|intf| Ok((*intf, Self::sender(Some(*intf), multicast_ttl)?)))
            .collect::<Result<Vec<_>, ShimError>>()?;
        Ok(Self { default, multicast })
    }

    fn sender(interface: Option<Ipv4Addr>, multicast_ttl: u32) -> Result<UdpSocket, ShimError> {
        let socket = new_udp_socket()?;
        set_reuse(&socket);
        socket
            .set_broadcast(true)
            .map_err(|e| ShimError::IoError(format!("Can't set SO_BROADCAST: {}", e)))?;
        socket
            .set_multicast_ttl_v4(multicast_ttl)
            .map_err(|e| ShimError::MulticastSetup(format!("IP_MULTICAST_TTL: {}", e)))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| ShimError::MulticastSetup(format!("IP_MULTICAST_LOOP: {}", e)))?;
        if let Some(intf) = interface {
            socket.set_multicast_if_v4(&intf).map_err(|e| {
                ShimError::MulticastSetup(format!("IP_MULTICAST_IF on {}: {}", intf, e))
            })?;
            debug!("Interface {} set for multicast sending", intf);
        }

        let any = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket
            .bind(&SockAddr::from(any))
            .map_err(|e| ShimError::BindFailed(format!("Failed to bind send socket: {}", e)))?;

        into_tokio(socket)
    }

    /// Sends `data` to `dest`
    ///
    /// Returns the number of datagrams sent.
    pub async fn send_to(&self, data: &[u8], dest: SocketAddrV4) -> Result<usize, ShimError> {
        let target = SocketAddr::V4(dest);

        if dest.ip().is_multicast() && !self.multicast.is_empty() {
            let mut sent = 0;
            let mut last_error = None;
            for (intf, socket) in &self.multicast {
                match socket.send_to(data, target).await {
                    Ok(_) => sent += 1,
                    Err(e) => {
                        warn!("Error sending to {} via {}: {}", dest, intf, e);
                        last_error = Some(e);
                    }
                }
            }
            return match (sent, last_error) {
                (0, Some(e)) => Err(ShimError::SendFailed(format!("{}: {}", dest, e))),
                _ => Ok(sent),
            };
        }

        self.default
            .send_to(data, target)
            .await
            .map_err(|e| ShimError::SendFailed(format!("{}: {}", dest, e)))?;
        Ok(1)
    }
}
