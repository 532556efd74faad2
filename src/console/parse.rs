// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Parsers for the routing daemon's console tables
//!
//! The console prints human-oriented tables. Parsing is keyword and token
//! based rather than column based, and anything that does not look like a
//! table row is skipped.

use super::{LinkInfo, RouteInfo};
use std::collections::HashMap;

const ROUTE_ARROW: &str = "->";
const LONG_STRINGS_HEADER: &str = "Long EIDs/Links referenced above";
const COS_FOOTER: &str = "Class of Service";
const TCP_INTERFACE_MARKER: &str = "Convergence Layer: tcp";

/// Parses the output of `route dump`
///
/// Route rows contain `->` between the COS bits and the next hop. Long
/// EIDs and link names are printed truncated as `prefix... [n]` and listed
/// in full after the table; those references are resolved here.
pub fn parse_route_dump(text: &str) -> Vec<RouteInfo> {
    let long_strings = parse_long_strings(text);
    let mut routes = Vec::new();

    for line in text.lines() {
        if line.contains(LONG_STRINGS_HEADER) || line.contains(COS_FOOTER) {
            break;
        }
        if !line.split_whitespace().any(|t| t == ROUTE_ARROW) {
            continue;
        }

        let tokens = resolve_long_tokens(line, &long_strings);
        let Some(arrow) = tokens.iter().position(|t| t == ROUTE_ARROW) else {
            continue;
        };
        let (Some(destination), Some(link)) = (tokens.first(), tokens.get(arrow + 1)) else {
            continue;
        };

        routes.push(RouteInfo {
            destination: destination.clone(),
            link: link.clone(),
            next_hop: None,
        });
    }

    routes
}

/// Collects the `[n]: value` footer of a route dump
fn parse_long_strings(text: &str) -> HashMap<usize, String> {
    let mut long_strings = HashMap::new();
    let mut in_section = false;

    for line in text.lines() {
        if line.contains(LONG_STRINGS_HEADER) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some((index, value)) = trimmed.split_once(':')
            && let Some(index) = parse_long_index(index)
        {
            long_strings.insert(index, value.trim().to_string());
        }
    }

    long_strings
}

/// Parses `[n]` into `n`
fn parse_long_index(token: &str) -> Option<usize> {
    token
        .trim()
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Splits a route row into tokens, folding `prefix... [n]` pairs back into
/// the full string they abbreviate
fn resolve_long_tokens(line: &str, long_strings: &HashMap<usize, String>) -> Vec<String> {
    let raw: Vec<&str> = line.split_whitespace().collect();
    let mut tokens = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let token = raw[i];
        if token.ends_with("...")
            && let Some(full) = raw
                .get(i + 1)
                .and_then(|next| parse_long_index(next))
                .and_then(|index| long_strings.get(&index))
        {
            tokens.push(full.clone());
            i += 2;
            continue;
        }
        tokens.push(token.to_string());
        i += 1;
    }

    tokens
}

/// Parses the output of `link dump`
///
/// Each link row has the form
/// `name [nexthop remote_eid TYPE clayer state=STATE]`.
pub fn parse_link_dump(text: &str) -> Vec<LinkInfo> {
    let mut links = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Previously active links") {
            break;
        }
        let Some((name, rest)) = trimmed.split_once(" [") else {
            continue;
        };
        let fields: Vec<&str> = rest.trim_end_matches(']').split_whitespace().collect();
        if name.contains(char::is_whitespace) || fields.is_empty() {
            continue;
        }

        let link_type = fields.get(2).map(|s| s.to_string()).unwrap_or_default();
        let opportunistic =
            name.starts_with("opportunistic") || link_type.eq_ignore_ascii_case("OPPORTUNISTIC");

        links.push(LinkInfo {
            name: name.to_string(),
            next_hop: fields[0].to_string(),
            link_type,
            opportunistic,
        });
    }

    links
}

/// Parses the output of `registration list` into endpoint patterns
///
/// Registration rows start with `id N` and name the endpoint right after
/// the `active`/`passive` marker.
pub fn parse_registration_list(text: &str) -> Vec<String> {
    parse_registrations(text)
        .into_iter()
        .map(|(_, endpoint)| endpoint)
        .collect()
}

/// Finds the local EID in the output of `registration dump`
///
/// The local EID is the endpoint of registration id 0.
pub fn parse_local_eid(text: &str) -> Option<String> {
    parse_registrations(text)
        .into_iter()
        .find(|(id, _)| *id == 0)
        .map(|(_, endpoint)| endpoint)
}

fn parse_registrations(text: &str) -> Vec<(u32, String)> {
    text.lines().filter_map(parse_registration_row).collect()
}

fn parse_registration_row(line: &str) -> Option<(u32, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let start = tokens.iter().position(|t| *t == "id")?;
    let id = tokens.get(start + 1)?.trim_end_matches(':').parse().ok()?;

    // Skip to the token closing the "id N [type]:" prefix
    let colon = tokens[start + 1..]
        .iter()
        .position(|t| t.ends_with(':'))
        .map(|p| start + 1 + p)?;

    let mut rest = tokens[colon + 1..].iter();
    let mut endpoint = rest.next()?;
    if *endpoint == "active" || *endpoint == "passive" {
        endpoint = rest.next()?;
    }

    Some((id, endpoint.to_string()))
}

/// Finds the TCP convergence layer listen port in `interface list` output
pub fn parse_listen_port(text: &str) -> Option<u16> {
    let lines: Vec<&str> = text.lines().collect();
    let index = lines.iter().position(|l| l.contains(TCP_INTERFACE_MARKER))?;
    let tokens: Vec<&str> = lines.get(index + 1)?.split_whitespace().collect();

    let port = match tokens.iter().position(|t| *t == "local_port:") {
        Some(p) => tokens.get(p + 1)?,
        None => tokens.get(3)?,
    };
    port.trim_end_matches(',').parse().ok()
}
