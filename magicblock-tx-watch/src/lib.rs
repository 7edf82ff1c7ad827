#![allow(clippy::result_large_err)]
pub mod auto_refresh;
pub mod cluster;
pub mod config;
pub mod consts;
pub mod errors;
pub mod fetch_cache;
pub mod ledger_source;
pub mod poller;
pub mod presentation;
pub mod sequencer;
pub mod signature;
pub mod transaction_view;
pub mod watcher;
pub mod zero_confirmation;

pub use auto_refresh::{classify, AutoRefreshMode};
pub use cluster::{ClusterMonitor, ClusterState, ClusterStatus};
pub use config::WatcherConfig;
pub use errors::{TxWatchError, TxWatchResult};
pub use fetch_cache::{FetchCache, FetchRecord, FetchStatus};
pub use ledger_source::LedgerSource;
pub use presentation::{
    AccountRow, AccountsCard, InstructionLogs, InstructionRow, StatusCard,
    StatusOverview, TokenBalanceRow, TransactionSnapshot,
};
pub use signature::parse_signature;
pub use transaction_view::TransactionView;
pub use watcher::{DetailRecord, StatusRecord, TransactionWatcher};

#[cfg(any(test, feature = "dev-context"))]
pub mod testing;
