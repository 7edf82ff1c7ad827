mod cluster_url;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::bail;
use clap::Parser;
use log::*;
use magicblock_rpc_client::{BlockTimestamp, MagicblockRpcClient};
use magicblock_tx_watch::{
    AccountsCard, AutoRefreshMode, ClusterMonitor, ClusterStatus, LedgerSource,
    StatusCard, TransactionSnapshot, TransactionView, TransactionWatcher,
    WatcherConfig,
};
use solana_sdk::{commitment_config::CommitmentConfig, native_token};
use tokio::time::Instant;

use crate::cluster_url::{resolve_cluster_url, DEFAULT_CLUSTER};

/// How often the state of the watched transaction is checked for changes
const REPORT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(name = "magicblock-tx-explorer")]
#[command(
    about = "Watches a transaction until it reaches max confirmations and shows its details"
)]
struct Args {
    /// Base58 encoded transaction signature
    signature: String,

    /// RPC URL of the cluster or one of mainnet, devnet, testnet, localhost
    #[arg(short, long, default_value = DEFAULT_CLUSTER)]
    url: String,

    /// Path to a TOML watcher config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gives up watching after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// How often to retry when the transaction kept reporting zero
    /// confirmations
    #[arg(long, default_value_t = 0)]
    bailout_retries: u32,
}

fn init_logger() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => WatcherConfig::try_load_from_file(path)?,
        None => WatcherConfig::default(),
    };
    let url = resolve_cluster_url(&args.url);
    debug!("Watcher config: {config:?}");

    let client = Arc::new(MagicblockRpcClient::new_from_url(
        &url,
        CommitmentConfig::confirmed(),
    ));
    let cluster = ClusterMonitor::new();
    let watcher =
        TransactionWatcher::new(client.clone(), config, cluster.subscribe());
    let mut view = TransactionView::new(watcher.clone());

    let signature = view.set_raw_signature(&args.signature)?;
    info!("Exploring {signature} on {url}");

    if cluster.connect(client.as_ref()).await == ClusterStatus::Failure {
        bail!("Unable to connect to {url}");
    }

    let result = watch(&view, &args).await;

    drop(view);
    watcher.shutdown();
    result
}

async fn watch<S: LedgerSource>(
    view: &TransactionView<S>,
    args: &Args,
) -> anyhow::Result<()> {
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let mut interval = tokio::time::interval(REPORT_INTERVAL);
    let mut retries_left = args.bailout_retries;
    let mut reported: Option<(Option<StatusCard>, Option<AccountsCard>)> =
        None;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::time::sleep_until(deadline) => {
                bail!("Gave up after {}s", args.timeout_secs);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }

        let Some(snapshot) = view.snapshot() else {
            bail!("Transaction is no longer observed");
        };
        let state = (Some(snapshot.status_card()), snapshot.accounts_card());
        if reported.as_ref() != Some(&state) {
            report(&snapshot, &state.0, &state.1);
            reported = Some(state.clone());
        }

        if snapshot.mode.is_bailed_out() && retries_left > 0 {
            retries_left -= 1;
            info!("Retrying, {retries_left} retries left");
            view.refresh_status()?;
            continue;
        }
        if is_done(snapshot.mode, &state.0, &state.1) {
            return Ok(());
        }
    }
}

/// Nothing changes anymore without user interaction.
fn is_done(
    mode: AutoRefreshMode,
    status: &Option<StatusCard>,
    accounts: &Option<AccountsCard>,
) -> bool {
    match (status, accounts) {
        (
            Some(StatusCard::FetchFailed { .. } | StatusCard::NotFound { .. }),
            _,
        ) => true,
        _ if mode.is_bailed_out() => true,
        (
            Some(StatusCard::Ready(_)),
            Some(
                AccountsCard::Ready(_)
                | AccountsCard::FetchFailed { .. }
                | AccountsCard::Unavailable
                | AccountsCard::MissingMetadata,
            ),
        ) => true,
        _ => false,
    }
}

// -----------------
// Reporting
// -----------------
fn report(
    snapshot: &TransactionSnapshot,
    status: &Option<StatusCard>,
    accounts: &Option<AccountsCard>,
) {
    match status {
        None | Some(StatusCard::Loading) => info!("Loading status"),
        Some(StatusCard::FetchFailed { error }) => {
            error!("Failed to fetch status: {error}")
        }
        Some(StatusCard::NotFound {
            first_available_block,
        }) => {
            warn!("Transaction {} not found", snapshot.signature);
            if let Some(block) = first_available_block {
                warn!(
                    "Note: transactions processed before block {block} are not available at this time"
                );
            }
        }
        Some(StatusCard::Ready(overview)) => {
            let info = &overview.info;
            let result = match &info.error {
                Some(err) => format!("Error ({err})"),
                None => "Success".to_string(),
            };
            let timestamp = match info.timestamp {
                BlockTimestamp::Unix(timestamp) => timestamp.to_string(),
                BlockTimestamp::Unavailable => "unavailable".to_string(),
            };
            info!(
                "Result: {result} | Block: {} | Confirmations: {} | Status: {} | Timestamp: {timestamp}{}",
                info.slot,
                info.confirmations,
                info.confirmation_status.as_deref().unwrap_or("unknown"),
                if overview.refreshing { " (refreshing)" } else { "" },
            );
            if let Some(blockhash) = &overview.recent_blockhash {
                let label = if overview.blockhash_is_nonce {
                    "Nonce"
                } else {
                    "Recent Blockhash"
                };
                info!("{label}: {blockhash}");
            }
            if let Some(fee) = overview.fee {
                info!("Fee: {} SOL", native_token::lamports_to_sol(fee));
            }
        }
    }

    match accounts {
        None => {}
        Some(AccountsCard::AwaitingMaxConfirmations { can_retry_status }) => {
            info!(
                "Details are not available until the transaction reaches MAX confirmations"
            );
            if *can_retry_status {
                warn!(
                    "Stopped polling since the transaction kept reporting zero confirmations"
                );
            }
        }
        Some(AccountsCard::Loading) => info!("Loading details"),
        Some(AccountsCard::FetchFailed { error }) => {
            error!("Failed to fetch details: {error}")
        }
        Some(AccountsCard::Unavailable) => warn!("Details are not available"),
        Some(AccountsCard::MissingMetadata) => {
            warn!("Transaction metadata is missing")
        }
        Some(AccountsCard::Ready(rows)) => {
            info!("Account Input(s):");
            for row in rows {
                let mut roles = vec![];
                if row.fee_payer {
                    roles.push("Fee Payer");
                }
                if row.writable {
                    roles.push("Writable");
                }
                if row.signer {
                    roles.push("Signer");
                }
                if row.program {
                    roles.push("Program");
                }
                info!(
                    "  #{} {} | Change: {} lamports | Post Balance: {} SOL | {}",
                    row.index + 1,
                    row.pubkey,
                    row.balance_delta,
                    native_token::lamports_to_sol(row.post_balance),
                    roles.join(", ")
                );
            }
            report_details(snapshot);
        }
    }
}

fn report_details(snapshot: &TransactionSnapshot) {
    if let Some(rows) = snapshot.token_balances_card() {
        info!("Token Balances:");
        for row in rows {
            info!(
                "  {} | Mint: {} | Change: {} | Post Balance: {}",
                row.account,
                row.mint,
                row.ui_delta(),
                row.ui_post_amount()
            );
        }
    }

    if let Some(rows) = snapshot.instructions_card() {
        info!("Instructions:");
        for row in rows {
            let program = row
                .program
                .clone()
                .unwrap_or_else(|| row.program_id.to_string());
            match row.instruction_type {
                Some(instruction_type) => info!(
                    "  #{} {program}: {instruction_type}",
                    row.index + 1
                ),
                None => info!("  #{} {program}", row.index + 1),
            }
        }
    }

    if let Some(groups) = snapshot.program_log_card() {
        info!("Program Logs:");
        for group in groups {
            if group.failed {
                warn!("  #{} failed", group.index + 1);
            }
            for line in group.logs {
                info!("  #{} > {line}", group.index + 1);
            }
        }
    }
}
