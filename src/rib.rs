// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Routing Information Base (RIB)
//!
//! The RIB is an annotated shadow of the routes this node has installed on
//! the routing daemon from peer advertisements. It holds at most one entry
//! per exact destination EID string; a wildcard entry and an exact entry
//! under it are separate entries.
//!
//! The RIB is not synchronized on its own. It lives inside the
//! [`Router`](crate::routing::Router), which is shared behind the single
//! process-wide lock.

use crate::eid;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Distance reported for an EID that has no RIB entry
///
/// Deliberately distinct from
/// [`UNREACHABLE_DISTANCE`](crate::advertisement::UNREACHABLE_DISTANCE):
/// an entry at the unreachable distance still exists and is still
/// advertised.
pub const NO_ENTRY_DISTANCE: u32 = 99_999;

/// A learned route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibEntry {
    /// IP address the advertisement came from
    pub next_hop_host: String,
    /// TCP convergence layer port of the next hop
    pub next_hop_port: u16,
    /// Advertised destination EID pattern
    pub destination: String,
    /// Hop count to the destination through this next hop
    pub distance: u32,
    /// Last time an accepted advertisement refreshed this entry
    pub last_update: Instant,
    /// Daemon link carrying traffic to the next hop
    pub link_name: String,
    /// EID of the node that advertised this route
    pub next_hop_eid: String,
}

impl RibEntry {
    /// Time since the last refresh
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_update)
    }
}

/// The Routing Information Base
///
/// Entries keep their insertion order so advertisements list routes in a
/// stable order.
#[derive(Debug, Clone, Default)]
pub struct Rib {
    entries: Vec<RibEntry>,
}

impl Rib {
    /// Creates a new, empty RIB
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the entry for exactly this destination
    pub fn get(&self, destination: &str) -> Option<&RibEntry> {
        self.entries.iter().find(|e| e.destination == destination)
    }

    /// Returns true if an entry exists for exactly this destination
    pub fn contains(&self, destination: &str) -> bool {
        self.get(destination).is_some()
    }

    /// Returns the best-known distance to `eid`
    ///
    /// An exact entry wins; otherwise the first stored pattern covering
    /// `eid` is used. Returns [`NO_ENTRY_DISTANCE`] if nothing covers it.
    pub fn current_distance_to(&self, eid: &str) -> u32 {
        if let Some(entry) = self.get(eid) {
            return entry.distance;
        }
        self.entries
            .iter()
            .find(|e| eid::matches(&e.destination, eid))
            .map(|e| e.distance)
            .unwrap_or(NO_ENTRY_DISTANCE)
    }

    /// Inserts an entry, replacing any entry for the same destination
    ///
    /// Returns true if a new entry was created.
    pub fn upsert(&mut self, entry: RibEntry) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.destination == entry.destination)
        {
            Some(existing) => {
                *existing = entry;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    /// Updates the distance and timestamp of an exact entry
    ///
    /// Returns false if there is no such entry.
    pub fn refresh(&mut self, destination: &str, distance: u32, now: Instant) -> bool {
        match self.entries.iter_mut().find(|e| e.destination == destination) {
            Some(entry) => {
                entry.distance = distance;
                entry.last_update = now;
                true
            }
            None => false,
        }
    }

    /// Resets the timestamp of an exact entry without changing its distance
    pub fn touch(&mut self, destination: &str, now: Instant) -> bool {
        match self.entries.iter_mut().find(|e| e.destination == destination) {
            Some(entry) => {
                entry.last_update = now;
                true
            }
            None => false,
        }
    }

    /// Removes the entry for exactly this destination
    pub fn remove(&mut self, destination: &str) -> Option<RibEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.destination == destination)?;
        Some(self.entries.remove(index))
    }

    /// Lists entries whose age exceeds `timeout`
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<RibEntry> {
        self.entries
            .iter()
            .filter(|e| e.age(now) > timeout)
            .cloned()
            .collect()
    }

    /// Iterates over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RibEntry> {
        self.entries.iter()
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the RIB has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Rib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>6} {:<28} {:>5} {:>6} {:<10} NEXT HOP EID",
            "HOST", "PORT", "DESTINATION", "DIST", "AGE", "LINK"
        )?;
        let now = Instant::now();
        for e in &self.entries {
            writeln!(
                f,
                "{:<16} {:>6} {:<28} {:>5} {:>5}s {:<10} {}",
                e.next_hop_host,
                e.next_hop_port,
                e.destination,
                e.distance,
                e.age(now).as_secs(),
                e.link_name,
                e.next_hop_eid
            )?;
        }
        Ok(())
    }
}
