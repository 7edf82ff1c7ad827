use log::*;
use solana_sdk::clock::Slot;
use tokio::sync::watch;

use crate::ledger_source::LedgerSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterStatus {
    Connecting,
    Connected,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    pub status: ClusterStatus,
    /// Oldest block the cluster retains, known once connected
    pub first_available_block: Option<Slot>,
}

impl ClusterState {
    pub fn is_connected(&self) -> bool {
        self.status == ClusterStatus::Connected
    }
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            status: ClusterStatus::Connecting,
            first_available_block: None,
        }
    }
}

/// Publishes the reachability of the cluster.
/// The watcher holds off initial status fetches until the cluster is
/// connected.
#[derive(Debug)]
pub struct ClusterMonitor {
    state_tx: watch::Sender<ClusterState>,
}

impl Default for ClusterMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterMonitor {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ClusterState::default());
        Self { state_tx }
    }

    /// Creates a monitor that already reports the cluster as connected.
    pub fn connected(first_available_block: Slot) -> Self {
        let monitor = Self::new();
        monitor.mark_connected(first_available_block);
        monitor
    }

    pub fn subscribe(&self) -> watch::Receiver<ClusterState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ClusterState {
        self.state_tx.borrow().clone()
    }

    pub fn mark_connected(&self, first_available_block: Slot) {
        self.state_tx.send_replace(ClusterState {
            status: ClusterStatus::Connected,
            first_available_block: Some(first_available_block),
        });
    }

    pub fn mark_failed(&self) {
        self.state_tx.send_modify(|state| {
            state.status = ClusterStatus::Failure;
        });
    }

    pub fn mark_connecting(&self) {
        self.state_tx.send_modify(|state| {
            state.status = ClusterStatus::Connecting;
        });
    }

    /// Probes the cluster by requesting its first available block and
    /// publishes the outcome.
    pub async fn connect<S: LedgerSource>(&self, source: &S) -> ClusterStatus {
        self.mark_connecting();
        match source.get_first_available_block().await {
            Ok(first_available_block) => {
                debug!(
                    "Cluster connected, first available block: {}",
                    first_available_block
                );
                self.mark_connected(first_available_block);
                ClusterStatus::Connected
            }
            Err(err) => {
                warn!("Failed to connect to cluster: {:?}", err);
                self.mark_failed();
                ClusterStatus::Failure
            }
        }
    }
}
