// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Endpoint identifier patterns
//!
//! Routes and registrations are EID patterns. A pattern either names one
//! endpoint exactly (`dtn://node1/ping`) or ends in a wildcard that covers
//! every EID sharing its prefix (`dtn://node1/*`, `dtn://node1/app?*`).

/// Suffix appended to a node EID to cover all of its endpoints
pub const WILDCARD_SUFFIX: &str = "/*";

/// Returns true if `pattern` covers `eid`
///
/// `eid` may itself be a pattern; it is compared as a plain string, so a
/// wildcard pattern covers any narrower pattern under the same prefix.
pub fn matches(pattern: &str, eid: &str) -> bool {
    if pattern == eid {
        return true;
    }

    let Some(prefix) = pattern.strip_suffix('*') else {
        return false;
    };
    let prefix = prefix.strip_suffix('?').unwrap_or(prefix);

    if eid.starts_with(prefix) {
        return true;
    }

    // `dtn://node1/*` also covers the bare node EID `dtn://node1`
    prefix
        .strip_suffix('/')
        .is_some_and(|node| !node.is_empty() && eid == node)
}

/// Builds the wildcard pattern covering every endpoint of `node_eid`
pub fn node_wildcard(node_eid: &str) -> String {
    format!("{}{}", node_eid.trim_end_matches('/'), WILDCARD_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("dtn://node1/ping", "dtn://node1/ping"));
        assert!(!matches("dtn://node1/ping", "dtn://node1/pong"));
        assert!(!matches("dtn://node1", "dtn://node1/ping"));
    }

    #[test]
    fn test_wildcard_covers_prefix() {
        assert!(matches("dtn://node1/*", "dtn://node1/ping"));
        assert!(matches("dtn://node1/*", "dtn://node1/a/b/c"));
        assert!(matches("dtn://node1/*", "dtn://node1"));
        assert!(!matches("dtn://node1/*", "dtn://node2/ping"));
        assert!(!matches("dtn://node1/*", "dtn://node10"));
    }

    #[test]
    fn test_wildcard_covers_narrower_pattern() {
        assert!(matches("dtn://node1/*", "dtn://node1/app/*"));
        assert!(!matches("dtn://node1/app/*", "dtn://node1/*"));
    }

    #[test]
    fn test_query_wildcard() {
        assert!(matches("dtn://node1/app?*", "dtn://node1/app"));
        assert!(matches("dtn://node1/app?*", "dtn://node1/app?x=1"));
        assert!(!matches("dtn://node1/app?*", "dtn://node1/other"));
    }

    #[test]
    fn test_catch_all() {
        assert!(matches("*", "dtn://anything/at/all"));
    }

    #[test]
    fn test_node_wildcard() {
        assert_eq!(node_wildcard("dtn://node1"), "dtn://node1/*");
        assert_eq!(node_wildcard("dtn://node1/"), "dtn://node1/*");
    }
}
