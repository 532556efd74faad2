// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Error types for DND
//!
//! Each component has its own typed error; `DndError` rolls them up for
//! the daemon entry points.

use thiserror::Error;

/// Main error type for DND operations
#[derive(Error, Debug)]
pub enum DndError {
    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),

    #[error("Advertisement error: {0}")]
    Advertisement(#[from] AdvertisementError),

    #[error("Shim error: {0}")]
    Shim(#[from] ShimError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Local EID could not be obtained from the routing daemon")]
    LocalEidUnavailable,

    #[error("TCP convergence layer listen port could not be obtained from the routing daemon")]
    ListenPortUnavailable,
}

/// Control-channel errors
///
/// `Unreachable` and `Timeout` both mean "the daemon is not answering";
/// callers skip the current operation and retry on the next cycle.
#[derive(Error, Debug, Clone)]
pub enum ConsoleError {
    #[error("Routing daemon unreachable at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("Routing daemon did not answer '{command}' within {millis}ms")]
    Timeout { command: String, millis: u64 },

    #[error("I/O error during '{command}': {reason}")]
    Io { command: String, reason: String },

    #[error("Could not parse response to '{command}': {reason}")]
    Parse { command: String, reason: String },
}

impl ConsoleError {
    /// True when the daemon could not be reached at all (as opposed to a
    /// response that did not parse).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ConsoleError::Unreachable { .. } | ConsoleError::Timeout { .. } | ConsoleError::Io { .. }
        )
    }
}

/// Advertisement wire format errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvertisementError {
    #[error("Payload is not valid UTF-8")]
    NotUtf8,

    #[error("Missing header line: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid listen port: {0}")]
    InvalidPort(String),

    #[error("Malformed entry on line {line}: {content:?}")]
    MalformedEntry { line: usize, content: String },

    #[error("Invalid distance on line {line}: {value:?}")]
    InvalidDistance { line: usize, value: String },
}

/// UDP shim layer errors
#[derive(Error, Debug, Clone)]
pub enum ShimError {
    #[error("Failed to bind socket: {0}")]
    BindFailed(String),

    #[error("Multicast setup failed: {0}")]
    MulticastSetup(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

