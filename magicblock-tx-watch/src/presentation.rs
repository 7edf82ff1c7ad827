use std::{collections::BTreeMap, str::FromStr};

use magicblock_rpc_client::{DetailInfo, StatusInfo, TokenBalance};
use solana_sdk::{clock::Slot, pubkey::Pubkey, signature::Signature};

use crate::{
    auto_refresh::AutoRefreshMode,
    fetch_cache::FetchRecord,
    ledger_source::LedgerSource,
    watcher::{DetailRecord, StatusRecord, TransactionWatcher},
};

// -----------------
// Snapshot
// -----------------

/// Everything known about an observed transaction at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSnapshot {
    pub signature: Signature,
    pub mode: AutoRefreshMode,
    pub status: Option<StatusRecord>,
    pub detail: Option<DetailRecord>,
    /// Status of the last successful fetch, kept while the status is being
    /// refreshed or a refresh failed
    pub latest_info: Option<StatusInfo>,
    pub first_available_block: Option<Slot>,
}

// -----------------
// Status Card
// -----------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOverview {
    pub signature: Signature,
    pub info: StatusInfo,
    /// The status is refreshed automatically, otherwise a manual refresh
    /// is offered
    pub refreshing: bool,
    pub recent_blockhash: Option<String>,
    /// The recent blockhash is the value of a durable nonce
    pub blockhash_is_nonce: bool,
    pub fee: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCard {
    Loading,
    FetchFailed {
        error: String,
    },
    NotFound {
        /// Set when the cluster does not retain its full history, older
        /// transactions cannot be found
        first_available_block: Option<Slot>,
    },
    Ready(Box<StatusOverview>),
}

impl StatusCard {
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            StatusCard::FetchFailed { .. } | StatusCard::NotFound { .. }
        )
    }
}

// -----------------
// Accounts Card
// -----------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub index: usize,
    pub pubkey: Pubkey,
    /// Lamports gained (positive) or spent (negative) by the transaction
    pub balance_delta: i128,
    pub post_balance: u64,
    pub fee_payer: bool,
    pub writable: bool,
    pub signer: bool,
    pub program: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountsCard {
    /// Details are only fetched once the transaction reached max
    /// confirmations
    AwaitingMaxConfirmations {
        /// Polling bailed out and the status can be requested again
        can_retry_status: bool,
    },
    Loading,
    FetchFailed {
        error: String,
    },
    Unavailable,
    MissingMetadata,
    Ready(Vec<AccountRow>),
}

// -----------------
// Token Balances
// -----------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceRow {
    pub account: Pubkey,
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    pub decimals: u8,
    /// Raw amount gained (positive) or spent (negative)
    pub delta: i128,
    pub post_amount: u64,
}

impl TokenBalanceRow {
    pub fn ui_delta(&self) -> String {
        ui_token_amount(self.delta, self.decimals)
    }

    pub fn ui_post_amount(&self) -> String {
        ui_token_amount(i128::from(self.post_amount), self.decimals)
    }
}

// -----------------
// Instructions
// -----------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRow {
    pub index: usize,
    pub program_id: Pubkey,
    /// Name of the program if the node parsed the instruction
    pub program: Option<String>,
    pub instruction_type: Option<String>,
}

/// Program logs of one top level instruction, including the logs of the
/// programs it invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLogs {
    pub index: usize,
    pub program_id: Option<Pubkey>,
    pub logs: Vec<String>,
    pub failed: bool,
}

impl TransactionSnapshot {
    pub fn status_card(&self) -> StatusCard {
        match &self.status {
            None => StatusCard::Loading,
            Some(FetchRecord::Fetching) => match &self.latest_info {
                // Keep showing the previous status while it is refreshed
                Some(info) if self.mode != AutoRefreshMode::Inactive => {
                    self.status_overview(info)
                }
                _ => StatusCard::Loading,
            },
            Some(FetchRecord::FetchFailed(error)) => StatusCard::FetchFailed {
                error: error.clone(),
            },
            Some(FetchRecord::Fetched(None)) => StatusCard::NotFound {
                first_available_block: self
                    .first_available_block
                    .filter(|block| *block > 1),
            },
            Some(FetchRecord::Fetched(Some(info))) => {
                self.status_overview(info)
            }
        }
    }

    fn status_overview(&self, info: &StatusInfo) -> StatusCard {
        let detail = self.fetched_detail();
        StatusCard::Ready(Box::new(StatusOverview {
            signature: self.signature,
            info: info.clone(),
            refreshing: self.mode.is_active(),
            recent_blockhash: detail
                .map(|detail| detail.recent_blockhash.clone())
                .filter(|blockhash| !blockhash.is_empty()),
            blockhash_is_nonce: detail
                .is_some_and(DetailInfo::is_nonce_transaction),
            fee: detail.and_then(DetailInfo::fee),
        }))
    }

    /// Returns `None` while there is no status to show details for.
    pub fn accounts_card(&self) -> Option<AccountsCard> {
        self.latest_info.as_ref()?;
        let card = match self.mode {
            AutoRefreshMode::BailedOut => {
                AccountsCard::AwaitingMaxConfirmations {
                    can_retry_status: true,
                }
            }
            AutoRefreshMode::Active => AccountsCard::AwaitingMaxConfirmations {
                can_retry_status: false,
            },
            AutoRefreshMode::Inactive => match &self.detail {
                None | Some(FetchRecord::Fetching) => AccountsCard::Loading,
                Some(FetchRecord::FetchFailed(error)) => {
                    AccountsCard::FetchFailed {
                        error: error.clone(),
                    }
                }
                Some(FetchRecord::Fetched(None)) => AccountsCard::Unavailable,
                Some(FetchRecord::Fetched(Some(detail))) => {
                    account_rows(detail)
                        .map(AccountsCard::Ready)
                        .unwrap_or(AccountsCard::MissingMetadata)
                }
            },
        };
        Some(card)
    }

    /// Returns `None` until the details were fetched or if the transaction
    /// did not touch any token accounts.
    pub fn token_balances_card(&self) -> Option<Vec<TokenBalanceRow>> {
        let rows = token_balance_rows(self.fetched_detail()?)?;
        (!rows.is_empty()).then_some(rows)
    }

    /// Returns `None` until the details were fetched.
    pub fn instructions_card(&self) -> Option<Vec<InstructionRow>> {
        let detail = self.fetched_detail()?;
        let rows = detail
            .instructions
            .iter()
            .enumerate()
            .map(|(index, ix)| InstructionRow {
                index,
                program_id: ix.program_id,
                program: ix.program.clone(),
                instruction_type: ix.instruction_type.clone(),
            })
            .collect();
        Some(rows)
    }

    /// Returns `None` until the details were fetched or if the node did
    /// not record program logs.
    pub fn program_log_card(&self) -> Option<Vec<InstructionLogs>> {
        let meta = self.fetched_detail()?.meta.as_ref()?;
        meta.log_messages.as_deref().map(instruction_logs)
    }

    fn fetched_detail(&self) -> Option<&DetailInfo> {
        match &self.detail {
            Some(FetchRecord::Fetched(Some(detail))) => Some(detail),
            _ => None,
        }
    }
}

fn account_rows(detail: &DetailInfo) -> Option<Vec<AccountRow>> {
    let meta = detail.meta.as_ref()?;
    let rows = detail
        .account_keys
        .iter()
        .enumerate()
        .map(|(index, key)| {
            let pre = meta.pre_balances.get(index).copied().unwrap_or_default();
            let post =
                meta.post_balances.get(index).copied().unwrap_or_default();
            AccountRow {
                index,
                pubkey: key.pubkey,
                balance_delta: i128::from(post) - i128::from(pre),
                post_balance: post,
                fee_payer: index == 0,
                writable: key.writable,
                signer: key.signer,
                program: detail.is_program(&key.pubkey),
            }
        })
        .collect();
    Some(rows)
}

fn token_balance_rows(detail: &DetailInfo) -> Option<Vec<TokenBalanceRow>> {
    let meta = detail.meta.as_ref()?;
    let mut balances: BTreeMap<
        u8,
        (Option<&TokenBalance>, Option<&TokenBalance>),
    > = BTreeMap::new();
    for balance in &meta.pre_token_balances {
        balances.entry(balance.account_index).or_default().0 = Some(balance);
    }
    for balance in &meta.post_token_balances {
        balances.entry(balance.account_index).or_default().1 = Some(balance);
    }

    let rows = balances
        .into_values()
        .filter_map(|(pre, post)| {
            let latest = post.or(pre)?;
            let account = detail
                .account_keys
                .get(usize::from(latest.account_index))?
                .pubkey;
            let pre_amount = pre.map_or(0, |balance| balance.amount);
            let post_amount = post.map_or(0, |balance| balance.amount);
            Some(TokenBalanceRow {
                account,
                mint: latest.mint,
                owner: latest.owner,
                decimals: latest.decimals,
                delta: i128::from(post_amount) - i128::from(pre_amount),
                post_amount,
            })
        })
        .collect();
    Some(rows)
}

/// Formats a raw token amount with the decimals of its mint, omitting
/// trailing zeros.
fn ui_token_amount(amount: i128, decimals: u8) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let decimals = usize::from(decimals);
    let digits =
        format!("{:0>width$}", amount.unsigned_abs(), width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{fraction}")
    }
}

/// Splits the logs at each `Program <id> invoke [1]` line which the
/// runtime logs when a top level instruction starts.
fn instruction_logs(logs: &[String]) -> Vec<InstructionLogs> {
    let mut groups: Vec<InstructionLogs> = vec![];
    for line in logs {
        let invoked = top_level_invoke(line);
        if invoked.is_some() || groups.is_empty() {
            let index = groups.len();
            groups.push(InstructionLogs {
                index,
                program_id: invoked,
                logs: vec![],
                failed: false,
            });
        }
        let Some(group) = groups.last_mut() else {
            continue;
        };
        if line.starts_with("Program ") && line.contains(" failed: ") {
            group.failed = true;
        }
        group.logs.push(line.clone());
    }
    groups
}

fn top_level_invoke(line: &str) -> Option<Pubkey> {
    let program_id = line
        .strip_prefix("Program ")?
        .strip_suffix(" invoke [1]")?;
    Pubkey::from_str(program_id).ok()
}

impl<S: LedgerSource> TransactionWatcher<S> {
    /// Returns `None` if the signature is not observed.
    pub fn snapshot(
        &self,
        signature: &Signature,
    ) -> Option<TransactionSnapshot> {
        let mode = self.current_mode(signature)?;
        Some(TransactionSnapshot {
            signature: *signature,
            mode,
            status: self.current_status(signature),
            detail: self.current_detail(signature),
            latest_info: self.latest_status_info(signature),
            first_available_block: self.cluster_state().first_available_block,
        })
    }

    pub fn status_card(&self, signature: &Signature) -> Option<StatusCard> {
        self.snapshot(signature)
            .map(|snapshot| snapshot.status_card())
    }

    pub fn accounts_card(
        &self,
        signature: &Signature,
    ) -> Option<AccountsCard> {
        self.snapshot(signature)
            .and_then(|snapshot| snapshot.accounts_card())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use magicblock_rpc_client::{Confirmations, ADVANCE_NONCE_INSTRUCTION_TYPE};
    use solana_sdk::system_program;

    use super::*;
    use crate::testing::utils::{detail_info, max_confirmations, status_info};

    fn snapshot(
        mode: AutoRefreshMode,
        status: Option<StatusRecord>,
    ) -> TransactionSnapshot {
        let latest_info = status
            .as_ref()
            .and_then(|record| record.data().cloned().flatten());
        TransactionSnapshot {
            signature: Signature::from([1u8; 64]),
            mode,
            status,
            detail: None,
            latest_info,
            first_available_block: None,
        }
    }

    #[test]
    fn test_status_card_loading() {
        let snapshot = snapshot(AutoRefreshMode::Inactive, None);
        assert_eq!(snapshot.status_card(), StatusCard::Loading);

        let snapshot = self::snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetching),
        );
        assert_eq!(snapshot.status_card(), StatusCard::Loading);
    }

    #[test]
    fn test_status_card_keeps_previous_status_while_refreshing() {
        let info = status_info(Confirmations::Count(3));
        let mut snapshot =
            snapshot(AutoRefreshMode::Active, Some(FetchRecord::Fetching));
        snapshot.latest_info = Some(info.clone());

        assert_matches!(
            snapshot.status_card(),
            StatusCard::Ready(overview)
                if overview.info == info && overview.refreshing
        );
    }

    #[test]
    fn test_status_card_fetch_failed() {
        let snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::FetchFailed("timeout".to_string())),
        );
        let card = snapshot.status_card();
        assert_matches!(&card, StatusCard::FetchFailed { error } if error == "timeout");
        assert!(card.can_retry());
    }

    #[test]
    fn test_status_card_not_found_notes_missing_history() {
        let mut snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(None)),
        );
        snapshot.first_available_block = Some(1);
        assert_eq!(
            snapshot.status_card(),
            StatusCard::NotFound {
                first_available_block: None
            }
        );

        snapshot.first_available_block = Some(1_000);
        assert_eq!(
            snapshot.status_card(),
            StatusCard::NotFound {
                first_available_block: Some(1_000)
            }
        );
    }

    #[test]
    fn test_status_card_shows_detail_fields() {
        let info = status_info(Confirmations::Max);
        let mut snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(Some(info))),
        );
        snapshot.detail = Some(FetchRecord::Fetched(Some(detail_info(true))));

        assert_matches!(
            snapshot.status_card(),
            StatusCard::Ready(overview) => {
                assert!(!overview.refreshing);
                assert!(overview.blockhash_is_nonce);
                assert_eq!(overview.fee, Some(5_000));
                assert!(overview.recent_blockhash.is_some());
            }
        );
    }

    #[test]
    fn test_accounts_card_without_status() {
        let snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(None)),
        );
        assert!(snapshot.accounts_card().is_none());
    }

    #[test]
    fn test_accounts_card_awaits_max_confirmations() {
        let info = status_info(Confirmations::Count(0));
        let status = Some(FetchRecord::Fetched(Some(info)));

        let active = snapshot(AutoRefreshMode::Active, status.clone());
        assert_eq!(
            active.accounts_card(),
            Some(AccountsCard::AwaitingMaxConfirmations {
                can_retry_status: false
            })
        );

        let bailed_out = snapshot(AutoRefreshMode::BailedOut, status);
        assert_eq!(
            bailed_out.accounts_card(),
            Some(AccountsCard::AwaitingMaxConfirmations {
                can_retry_status: true
            })
        );
    }

    #[test]
    fn test_accounts_card_detail_states() {
        let info = status_info(Confirmations::Max);
        let mut snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(Some(info))),
        );
        assert_eq!(snapshot.accounts_card(), Some(AccountsCard::Loading));

        snapshot.detail = Some(FetchRecord::FetchFailed("gone".to_string()));
        assert_matches!(
            snapshot.accounts_card(),
            Some(AccountsCard::FetchFailed { error }) if error == "gone"
        );

        snapshot.detail = Some(FetchRecord::Fetched(None));
        assert_eq!(snapshot.accounts_card(), Some(AccountsCard::Unavailable));

        let mut detail = detail_info(false);
        detail.meta = None;
        snapshot.detail = Some(FetchRecord::Fetched(Some(detail)));
        assert_eq!(
            snapshot.accounts_card(),
            Some(AccountsCard::MissingMetadata)
        );
    }

    #[test]
    fn test_account_rows() {
        let info = status_info(Confirmations::Max);
        let detail = detail_info(false);
        let mut snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(Some(info))),
        );
        snapshot.detail = Some(FetchRecord::Fetched(Some(detail.clone())));

        let rows = assert_matches!(
            snapshot.accounts_card(),
            Some(AccountsCard::Ready(rows)) => rows
        );
        assert_eq!(rows.len(), 3);

        let payer = &rows[0];
        assert!(payer.fee_payer && payer.signer && payer.writable);
        assert_eq!(payer.balance_delta, -1_005_000);

        let recipient = &rows[1];
        assert!(!recipient.fee_payer && !recipient.signer);
        assert_eq!(recipient.balance_delta, 1_000_000);
        assert_eq!(recipient.post_balance, 1_000_000);

        let program = &rows[2];
        assert!(program.program && !program.writable);
        assert_eq!(program.balance_delta, 0);
    }

    fn fetched_snapshot(detail: DetailInfo) -> TransactionSnapshot {
        let mut snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(Some(max_confirmations()))),
        );
        snapshot.detail = Some(FetchRecord::Fetched(Some(detail)));
        snapshot
    }

    fn token_balance(
        account_index: u8,
        mint: Pubkey,
        amount: u64,
    ) -> TokenBalance {
        TokenBalance {
            account_index,
            mint,
            owner: Some(Pubkey::new_unique()),
            amount,
            decimals: 6,
        }
    }

    #[test]
    fn test_detail_cards_require_fetched_details() {
        let snapshot = snapshot(
            AutoRefreshMode::Inactive,
            Some(FetchRecord::Fetched(Some(max_confirmations()))),
        );
        assert!(snapshot.token_balances_card().is_none());
        assert!(snapshot.instructions_card().is_none());
        assert!(snapshot.program_log_card().is_none());
    }

    #[test]
    fn test_token_balances_card() {
        let mint = Pubkey::new_unique();
        let mut detail = detail_info(false);
        let meta = detail.meta.as_mut().unwrap();
        meta.pre_token_balances = vec![token_balance(1, mint, 2_500_000)];
        meta.post_token_balances = vec![
            token_balance(1, mint, 500_000),
            token_balance(2, mint, 2_000_000),
        ];
        let accounts = detail
            .account_keys
            .iter()
            .map(|key| key.pubkey)
            .collect::<Vec<_>>();

        let rows = fetched_snapshot(detail).token_balances_card().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, accounts[1]);
        assert_eq!(rows[0].mint, mint);
        assert_eq!(rows[0].delta, -2_000_000);
        assert_eq!(rows[0].ui_delta(), "-2");
        assert_eq!(rows[0].ui_post_amount(), "0.5");
        // A token account created by the transaction has no pre balance
        assert_eq!(rows[1].account, accounts[2]);
        assert_eq!(rows[1].delta, 2_000_000);
        assert_eq!(rows[1].ui_post_amount(), "2");
    }

    #[test]
    fn test_token_balances_card_without_token_accounts() {
        let snapshot = fetched_snapshot(detail_info(false));
        assert!(snapshot.token_balances_card().is_none());
    }

    #[test]
    fn test_ui_token_amount() {
        assert_eq!(ui_token_amount(0, 6), "0");
        assert_eq!(ui_token_amount(1, 6), "0.000001");
        assert_eq!(ui_token_amount(-1_250_000, 6), "-1.25");
        assert_eq!(ui_token_amount(42, 0), "42");
    }

    #[test]
    fn test_instructions_card() {
        let rows = fetched_snapshot(detail_info(true))
            .instructions_card()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(
            rows[0].instruction_type.as_deref(),
            Some(ADVANCE_NONCE_INSTRUCTION_TYPE)
        );
        assert_eq!(rows[1].instruction_type.as_deref(), Some("transfer"));
        assert_eq!(rows[1].program.as_deref(), Some("system"));
    }

    #[test]
    fn test_program_log_card_groups_logs_by_instruction() {
        let program = Pubkey::new_unique();
        let logs = [
            format!("Program {program} invoke [1]"),
            format!("Program {} invoke [2]", system_program::id()),
            format!("Program {} success", system_program::id()),
            "Program log: Instruction: Transfer".to_string(),
            format!("Program {program} success"),
            format!("Program {program} invoke [1]"),
            format!("Program {program} failed: custom program error: 0x1"),
        ];
        let mut detail = detail_info(false);
        detail.meta.as_mut().unwrap().log_messages = Some(logs.to_vec());

        let groups = fetched_snapshot(detail).program_log_card().unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].program_id, Some(program));
        assert_eq!(groups[0].logs.len(), 5);
        assert!(!groups[0].failed);
        assert_eq!(groups[1].index, 1);
        assert_eq!(groups[1].logs.len(), 2);
        assert!(groups[1].failed);
    }

    #[test]
    fn test_program_log_card_without_logs() {
        let mut detail = detail_info(false);
        detail.meta.as_mut().unwrap().log_messages = None;
        assert!(fetched_snapshot(detail).program_log_card().is_none());
    }
}
