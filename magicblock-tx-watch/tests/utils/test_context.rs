#![allow(dead_code)]
use std::{sync::Arc, time::Duration};

use magicblock_rpc_client::StatusInfo;
use magicblock_tx_watch::{
    testing::{
        init_logger, ledger_source_mock::LedgerSourceMock,
        utils::{setup_watcher, unique_signature},
    },
    AutoRefreshMode, ClusterMonitor, TransactionWatcher, WatcherConfig,
};
use solana_sdk::signature::Signature;

pub struct TestContext {
    pub source: Arc<LedgerSourceMock>,
    pub watcher: TransactionWatcher<LedgerSourceMock>,
    pub cluster: ClusterMonitor,
    pub config: WatcherConfig,
}

impl TestContext {
    pub fn init() -> Self {
        Self::init_with_config(WatcherConfig::default())
    }

    pub fn init_with_config(config: WatcherConfig) -> Self {
        init_logger();
        let source = Arc::new(LedgerSourceMock::new());
        let (watcher, cluster) = setup_watcher(&source, config.clone());
        Self {
            source,
            watcher,
            cluster,
            config,
        }
    }

    /// Creates a signature whose status is reported by the ledger source
    /// as provided, the last status is repeated for further requests.
    pub fn signature_with_statuses(
        &self,
        statuses: &[StatusInfo],
    ) -> Signature {
        let signature = unique_signature();
        for status in statuses {
            self.source.add_status(signature, status.clone());
        }
        signature
    }

    /// Replaces the scripted status responses for the signature.
    pub fn respond_with_status(
        &self,
        signature: Signature,
        status: StatusInfo,
    ) {
        self.source.clear_statuses(&signature);
        self.source.add_status(signature, status);
    }

    /// Runs all tasks that are ready without reaching the next refresh.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    /// Lets the armed refresh timer fire once and its fetch resolve.
    pub async fn next_refresh(&self) {
        tokio::time::sleep(self.config.auto_refresh_interval()).await;
    }

    pub fn mode(&self, signature: &Signature) -> Option<AutoRefreshMode> {
        self.watcher.current_mode(signature)
    }

    pub fn zero_confirmation_count(&self, signature: &Signature) -> u32 {
        self.watcher
            .zero_confirmation_count(signature)
            .unwrap_or_default()
    }

    pub fn status_calls(&self, signature: &Signature) -> usize {
        self.source.status_calls(signature)
    }

    pub fn detail_calls(&self, signature: &Signature) -> usize {
        self.source.detail_calls(signature)
    }
}
