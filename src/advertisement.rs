// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Advertisement wire format
//!
//! Advertisements are ASCII text, one LF-terminated field per line:
//!
//! ```text
//! <sender EID>
//! <sender TCP listen port>
//! <destination EID> <distance> <next-hop EID>
//! ...
//! ```

use crate::error::AdvertisementError;
use std::fmt;

/// Distance advertised for a destination that is no longer reachable
pub const UNREACHABLE_DISTANCE: u32 = 100;

/// Default UDP port for advertisements
pub const DEFAULT_PORT: u16 = 5005;

/// Largest datagram the listener will accept
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// One `(destination, distance, next hop)` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRoute {
    /// Destination EID pattern
    pub destination: String,
    /// Hop count from the sender
    pub distance: u32,
    /// EID of the node the sender reaches the destination through
    pub next_hop_eid: String,
}

impl AdvertisedRoute {
    pub fn new(destination: impl Into<String>, distance: u32, next_hop_eid: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            distance,
            next_hop_eid: next_hop_eid.into(),
        }
    }
}

impl fmt::Display for AdvertisedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.destination, self.distance, self.next_hop_eid)
    }
}

/// A complete advertisement datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// EID of the advertising node
    pub sender_eid: String,
    /// TCP convergence layer port the sender listens on
    pub listen_port: u16,
    /// Advertised routes, in send order
    pub routes: Vec<AdvertisedRoute>,
}

impl Advertisement {
    /// Creates an empty advertisement for the given sender
    pub fn new(sender_eid: impl Into<String>, listen_port: u16) -> Self {
        Self {
            sender_eid: sender_eid.into(),
            listen_port,
            routes: Vec::new(),
        }
    }

    /// Appends a route
    pub fn push(&mut self, route: AdvertisedRoute) {
        self.routes.push(route);
    }

    /// Serializes to the wire format
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{}\n{}\n", self.sender_eid, self.listen_port);
        for route in &self.routes {
            out.push_str(&route.to_string());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parses a received datagram
    ///
    /// Blank lines are skipped, so a trailing LF (or its absence) does not
    /// change the result. Any malformed route line rejects the whole
    /// datagram.
    pub fn decode(data: &[u8]) -> Result<Self, AdvertisementError> {
        let text = std::str::from_utf8(data).map_err(|_| AdvertisementError::NotUtf8)?;
        let mut lines = text.split('\n').map(|line| line.trim_end_matches('\r'));

        let sender_eid = lines
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AdvertisementError::MissingHeader("sender EID"))?
            .to_string();

        let port_line = lines
            .next()
            .map(str::trim)
            .ok_or(AdvertisementError::MissingHeader("listen port"))?;
        let listen_port = port_line
            .parse::<u16>()
            .map_err(|_| AdvertisementError::InvalidPort(port_line.to_string()))?;

        let mut routes = Vec::new();
        for (index, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 3;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [destination, distance, next_hop] = fields.as_slice() else {
                return Err(AdvertisementError::MalformedEntry {
                    line: line_no,
                    content: line.to_string(),
                });
            };
            let distance = distance
                .parse::<u32>()
                .map_err(|_| AdvertisementError::InvalidDistance {
                    line: line_no,
                    value: distance.to_string(),
                })?;
            routes.push(AdvertisedRoute::new(*destination, distance, *next_hop));
        }

        Ok(Self {
            sender_eid,
            listen_port,
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut adv = Advertisement::new("dtn://node1", 4556);
        adv.push(AdvertisedRoute::new("dtn://node1/*", 0, "dtn://node1"));
        adv.push(AdvertisedRoute::new("dtn://far", 2, "dtn://peer"));

        let text = String::from_utf8(adv.encode()).unwrap();
        assert_eq!(
            text,
            "dtn://node1\n4556\ndtn://node1/* 0 dtn://node1\ndtn://far 2 dtn://peer\n"
        );
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        let adv = Advertisement::decode(b"dtn://peer\n4556\ndtn://dest1 0 dtn://peer").unwrap();
        assert_eq!(adv.sender_eid, "dtn://peer");
        assert_eq!(adv.listen_port, 4556);
        assert_eq!(adv.routes, vec![AdvertisedRoute::new("dtn://dest1", 0, "dtn://peer")]);
    }

    #[test]
    fn test_decode_header_only() {
        let adv = Advertisement::decode(b"dtn://peer\n4556\n").unwrap();
        assert!(adv.routes.is_empty());
    }

    #[test]
    fn test_decode_rejects_missing_port() {
        assert_eq!(
            Advertisement::decode(b"dtn://peer"),
            Err(AdvertisementError::MissingHeader("listen port"))
        );
        assert!(matches!(
            Advertisement::decode(b"dtn://peer\nnotaport\n"),
            Err(AdvertisementError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_entries() {
        assert!(matches!(
            Advertisement::decode(b"dtn://peer\n4556\ndtn://dest1 0\n"),
            Err(AdvertisementError::MalformedEntry { line: 3, .. })
        ));
        assert!(matches!(
            Advertisement::decode(b"dtn://peer\n4556\ndtn://dest1 x dtn://peer\n"),
            Err(AdvertisementError::InvalidDistance { line: 3, .. })
        ));
        assert!(matches!(
            Advertisement::decode(b"dtn://peer\n4556\ndtn://dest1 -1 dtn://peer\n"),
            Err(AdvertisementError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_empty_and_binary() {
        assert_eq!(
            Advertisement::decode(b""),
            Err(AdvertisementError::MissingHeader("sender EID"))
        );
        assert_eq!(
            Advertisement::decode(&[0xff, 0xfe, 0x00]),
            Err(AdvertisementError::NotUtf8)
        );
    }
}
