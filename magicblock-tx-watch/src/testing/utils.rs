#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use magicblock_rpc_client::{
    AccountKey, BlockTimestamp, Confirmations, DetailInfo, InstructionInfo,
    StatusInfo, TransactionMeta, ADVANCE_NONCE_INSTRUCTION_TYPE,
};
use solana_sdk::{pubkey::Pubkey, signature::Signature, system_program};

use crate::{
    cluster::ClusterMonitor, config::WatcherConfig,
    testing::ledger_source_mock::LedgerSourceMock,
    watcher::TransactionWatcher,
};

pub const STATUS_SLOT: u64 = 42;
pub const FEE: u64 = 5_000;

pub fn init_logger() {
    let _ = env_logger::builder()
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .format_source_path(true)
        .is_test(true)
        .try_init();
}

/// Signatures that are unique within the test binary.
pub fn unique_signature() -> Signature {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let mut bytes = [0u8; 64];
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    bytes[..8].copy_from_slice(&id.to_le_bytes());
    Signature::from(bytes)
}

pub fn status_info(confirmations: Confirmations) -> StatusInfo {
    let confirmation_status = if confirmations.is_max() {
        "finalized"
    } else if confirmations.is_zero() {
        "processed"
    } else {
        "confirmed"
    };
    StatusInfo {
        slot: STATUS_SLOT,
        confirmations,
        confirmation_status: Some(confirmation_status.to_string()),
        error: None,
        timestamp: BlockTimestamp::Unix(1_700_000_000),
    }
}

pub fn zero_confirmations() -> StatusInfo {
    status_info(Confirmations::Count(0))
}

pub fn max_confirmations() -> StatusInfo {
    status_info(Confirmations::Max)
}

/// A transfer of 1_000_000 lamports from the fee payer to a recipient,
/// optionally preceded by advancing a durable nonce.
pub fn detail_info(uses_nonce: bool) -> DetailInfo {
    let payer = Pubkey::new_unique();
    let recipient = Pubkey::new_unique();

    let system_ix = |instruction_type: &str| InstructionInfo {
        program_id: system_program::id(),
        program: Some("system".to_string()),
        instruction_type: Some(instruction_type.to_string()),
    };
    let mut instructions = vec![];
    if uses_nonce {
        instructions.push(system_ix(ADVANCE_NONCE_INSTRUCTION_TYPE));
    }
    instructions.push(system_ix("transfer"));
    let log_messages = instructions
        .iter()
        .flat_map(|ix| {
            [
                format!("Program {} invoke [1]", ix.program_id),
                format!("Program {} success", ix.program_id),
            ]
        })
        .collect();

    DetailInfo {
        slot: STATUS_SLOT,
        block_time: Some(1_700_000_000),
        recent_blockhash: "4sGjMW1sUnHzSxGspuhpqLDx6wiyjNtZAMdL4VZHirAn"
            .to_string(),
        account_keys: vec![
            AccountKey {
                pubkey: payer,
                writable: true,
                signer: true,
            },
            AccountKey {
                pubkey: recipient,
                writable: true,
                signer: false,
            },
            AccountKey {
                pubkey: system_program::id(),
                writable: false,
                signer: false,
            },
        ],
        instructions,
        meta: Some(TransactionMeta {
            fee: FEE,
            pre_balances: vec![2_000_000, 0, 1],
            post_balances: vec![995_000, 1_000_000, 1],
            pre_token_balances: vec![],
            post_token_balances: vec![],
            log_messages: Some(log_messages),
            error: None,
        }),
    }
}

/// Creates a watcher on top of the mock whose cluster is connected.
pub fn setup_watcher(
    source: &Arc<LedgerSourceMock>,
    config: WatcherConfig,
) -> (TransactionWatcher<LedgerSourceMock>, ClusterMonitor) {
    let cluster = ClusterMonitor::connected(1);
    let watcher =
        TransactionWatcher::new(source.clone(), config, cluster.subscribe());
    (watcher, cluster)
}

/// Polls the condition until it holds, giving up after one second.
/// Advances the clock in small steps when it is paused, which stays well
/// below the refresh interval.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline =
        tokio::time::Instant::now() + Duration::from_millis(1_000);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}

/// Lets spawned tasks run without awaiting any condition.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
