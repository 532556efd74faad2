// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

//! Advertisement receive loop
//!
//! One listener runs per configured listen socket. Each datagram is
//! decoded and then processed under the router lock, so advertisements
//! from different sockets never interleave.

use crate::advertisement::{Advertisement, MAX_DATAGRAM_SIZE};
use crate::console::RoutingDaemon;
use crate::error::DndError;
use crate::routing::{Decision, SharedRouter};
use log::{debug, info, trace, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pause after the first failed receive
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Longest pause between failed receives
const MAX_RECV_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Pause before receiving again after `consecutive_errors` failures
fn recv_backoff(consecutive_errors: u32) -> Duration {
    RECV_ERROR_BACKOFF
        .saturating_mul(1 << consecutive_errors.saturating_sub(1).min(6))
        .min(MAX_RECV_ERROR_BACKOFF)
}

/// Receives advertisements on one socket and feeds them to the router
pub struct Listener<D> {
    router: SharedRouter<D>,
    socket: UdpSocket,
}

impl<D: RoutingDaemon + 'static> Listener<D> {
    pub fn new(router: SharedRouter<D>, socket: UdpSocket) -> Self {
        Self { router, socket }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Processes one received datagram
    ///
    /// An empty datagram is ignored. A malformed one is rejected as a
    /// whole before the router lock is taken.
    pub async fn handle_datagram(
        &self,
        data: &[u8],
        source: SocketAddr,
    ) -> Result<Vec<Decision>, DndError> {
        if data.is_empty() {
            trace!("Ignoring empty datagram from {}", source);
            return Ok(Vec::new());
        }

        let adv = Advertisement::decode(data)?;
        let mut router = self.router.lock().await;
        let decisions = router
            .process_advertisement(&adv, source.ip(), Instant::now())
            .await?;
        Ok(decisions)
    }

    /// Receives until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let local = self
            .socket
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        info!("Listener started on {}", local);

        let mut consecutive_errors = 0u32;
        loop {
            let (len, source) = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Listener on {} shutting down", local);
                    break;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        consecutive_errors = consecutive_errors.saturating_add(1);
                        let pause = recv_backoff(consecutive_errors);
                        warn!(
                            "UDP receive on {} failed ({} in a row), retrying in {:?}: {}",
                            local, consecutive_errors, pause, e
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Listener on {} shutting down", local);
                                break;
                            }
                            _ = tokio::time::sleep(pause) => {}
                        }
                        continue;
                    }
                },
            };
            consecutive_errors = 0;

            debug!("Got {} bytes from {} on {}", len, source, local);

            match self.handle_datagram(&buf[..len], source).await {
                Ok(_) => {}
                Err(DndError::Advertisement(e)) => {
                    warn!("Dropping malformed advertisement from {}: {}", source, e);
                }
                Err(e) => {
                    warn!("Aborted advertisement from {}: {}", source, e);
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
