use crate::client::network::NetworkCapability;
use crate::types::ServerDescriptor;

use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Tally of one wake fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WakeReport {
    pub sent: usize,
    pub failed: usize,
}

impl WakeReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }

    fn add(self, other: WakeReport) -> WakeReport {
        WakeReport {
            sent: self.sent + other.sent,
            failed: self.failed + other.failed,
        }
    }
}

/// Best-effort wake-on-LAN for a server's saved targets.
pub struct WakeCoordinator {
    network: Arc<dyn NetworkCapability>,
}

impl WakeCoordinator {
    pub fn new(network: Arc<dyn NetworkCapability>) -> Self {
        Self { network }
    }

    /// Signal every wake target of `server` concurrently and return once all
    /// of them have reported. Never fails: individual send errors are only
    /// counted.
    pub async fn wake(&self, server: &ServerDescriptor) -> WakeReport {
        let count = server.wake_targets.len();
        if count == 0 {
            log::debug!("Server {} has no saved wake-on-LAN targets", server.name);
            return WakeReport::default();
        }

        log::debug!("Waking server {} (id {}, {} targets)", server.name, server.id, count);

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let sends = server.wake_targets.iter().map(|target| {
            let (completed, failed) = (&completed, &failed);
            async move {
                if let Err(e) = self.network.send_wake(&target.mac_address, target.port).await {
                    log::debug!("Wake signal to {} failed: {}", target.mac_address, e);
                    failed.fetch_add(1, Ordering::SeqCst);
                }
                completed.fetch_add(1, Ordering::SeqCst);
            }
        });
        join_all(sends).await;

        let completed = completed.load(Ordering::SeqCst);
        let failed = failed.load(Ordering::SeqCst);
        debug_assert_eq!(completed, count);
        WakeReport {
            sent: completed - failed,
            failed,
        }
    }

    /// Wake every server in `servers` (e.g. after the device resumes).
    pub async fn wake_all(&self, servers: &[ServerDescriptor]) -> WakeReport {
        log::debug!("Waking all servers");
        join_all(servers.iter().map(|server| self.wake(server)))
            .await
            .into_iter()
            .fold(WakeReport::default(), WakeReport::add)
    }
}
