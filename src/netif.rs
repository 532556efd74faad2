// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Local interface discovery
//!
//! Used to pick the default advertisement destination when none is
//! configured.

use std::net::Ipv4Addr;

/// Returns the broadcast address of the first non-loopback IPv4 interface
///
/// Returns `Ok(None)` if no interface has a broadcast address.
pub fn first_broadcast_address() -> std::io::Result<Option<Ipv4Addr>> {
    let addrs = nix::ifaddrs::getifaddrs().map_err(std::io::Error::other)?;

    for ifaddr in addrs {
        let Some(address) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        if address.ip().is_loopback() {
            continue;
        }
        if let Some(broadcast) = ifaddr.broadcast.as_ref().and_then(|b| b.as_sockaddr_in()) {
            let ip = broadcast.ip();
            if !ip.is_unspecified() {
                return Ok(Some(ip));
            }
        }
    }

    Ok(None)
}
