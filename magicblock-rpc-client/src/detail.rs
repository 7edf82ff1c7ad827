use std::str::FromStr;

use solana_sdk::{
    clock::{Slot, UnixTimestamp},
    pubkey::Pubkey,
    signature::Signature,
    system_instruction::SystemInstruction,
    system_program,
};
use solana_transaction_status_client_types::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction,
    UiCompiledInstruction, UiInstruction, UiMessage, UiParsedInstruction,
    UiRawMessage, UiTransactionStatusMeta, UiTransactionTokenBalance,
};

use crate::{MagicBlockRpcClientError, MagicBlockRpcClientResult};

/// The instruction type the system program reports when a durable nonce
/// is advanced.
pub const ADVANCE_NONCE_INSTRUCTION_TYPE: &str = "advanceNonce";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKey {
    pub pubkey: Pubkey,
    pub writable: bool,
    pub signer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionInfo {
    pub program_id: Pubkey,
    /// Name of the program if the node was able to parse the instruction
    pub program: Option<String>,
    pub instruction_type: Option<String>,
}

/// Balance of a token account before or after the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    /// Index into the account keys of the transaction
    pub account_index: u8,
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    /// Raw amount, not adjusted by the decimals of the mint
    pub amount: u64,
    pub decimals: u8,
}

impl TokenBalance {
    fn try_from_ui(
        signature: &Signature,
        balance: UiTransactionTokenBalance,
    ) -> MagicBlockRpcClientResult<Self> {
        let owner: Option<String> = balance.owner.into();
        let amount = balance.ui_token_amount.amount;
        Ok(Self {
            account_index: balance.account_index,
            mint: parse_pubkey(signature, &balance.mint)?,
            owner: owner
                .map(|owner| parse_pubkey(signature, &owner))
                .transpose()?,
            amount: amount.parse().map_err(|_| {
                MagicBlockRpcClientError::InvalidTokenAmount(
                    *signature,
                    amount.clone(),
                )
            })?,
            decimals: balance.ui_token_amount.decimals,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMeta {
    pub fee: u64,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    pub log_messages: Option<Vec<String>>,
    pub error: Option<String>,
}

impl TransactionMeta {
    fn try_from_ui(
        signature: &Signature,
        meta: UiTransactionStatusMeta,
    ) -> MagicBlockRpcClientResult<Self> {
        let token_balances =
            |balances: Option<Vec<UiTransactionTokenBalance>>| {
                balances
                    .unwrap_or_default()
                    .into_iter()
                    .map(|balance| {
                        TokenBalance::try_from_ui(signature, balance)
                    })
                    .collect::<MagicBlockRpcClientResult<Vec<_>>>()
            };
        Ok(Self {
            fee: meta.fee,
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
            pre_token_balances: token_balances(meta.pre_token_balances.into())?,
            post_token_balances: token_balances(
                meta.post_token_balances.into(),
            )?,
            log_messages: meta.log_messages.into(),
            error: meta.err.map(|err| err.to_string()),
        })
    }
}

/// Full transaction detail, only requested once the transaction reached
/// max confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailInfo {
    pub slot: Slot,
    pub block_time: Option<UnixTimestamp>,
    pub recent_blockhash: String,
    pub account_keys: Vec<AccountKey>,
    pub instructions: Vec<InstructionInfo>,
    pub meta: Option<TransactionMeta>,
}

impl DetailInfo {
    pub fn try_from_encoded(
        signature: &Signature,
        tx: EncodedConfirmedTransactionWithStatusMeta,
    ) -> MagicBlockRpcClientResult<Self> {
        let EncodedTransaction::Json(ui_transaction) =
            tx.transaction.transaction
        else {
            return Err(
                MagicBlockRpcClientError::UnsupportedTransactionEncoding(
                    *signature,
                ),
            );
        };

        let (recent_blockhash, account_keys, instructions) =
            match ui_transaction.message {
                UiMessage::Parsed(message) => {
                    let account_keys = message
                        .account_keys
                        .iter()
                        .map(|account| {
                            Ok(AccountKey {
                                pubkey: parse_pubkey(
                                    signature,
                                    &account.pubkey,
                                )?,
                                writable: account.writable,
                                signer: account.signer,
                            })
                        })
                        .collect::<MagicBlockRpcClientResult<Vec<_>>>()?;
                    let instructions = message
                        .instructions
                        .iter()
                        .map(|ix| {
                            instruction_info(signature, &account_keys, ix)
                        })
                        .collect::<MagicBlockRpcClientResult<Vec<_>>>()?;
                    (message.recent_blockhash, account_keys, instructions)
                }
                UiMessage::Raw(message) => {
                    let account_keys = raw_account_keys(signature, &message)?;
                    let instructions = message
                        .instructions
                        .iter()
                        .map(|ix| {
                            compiled_instruction_info(
                                signature,
                                &account_keys,
                                ix,
                            )
                        })
                        .collect::<MagicBlockRpcClientResult<Vec<_>>>()?;
                    (message.recent_blockhash, account_keys, instructions)
                }
            };

        Ok(Self {
            slot: tx.slot,
            block_time: tx.block_time,
            recent_blockhash,
            account_keys,
            instructions,
            meta: tx
                .transaction
                .meta
                .map(|meta| TransactionMeta::try_from_ui(signature, meta))
                .transpose()?,
        })
    }

    pub fn fee(&self) -> Option<u64> {
        self.meta.as_ref().map(|meta| meta.fee)
    }

    /// A transaction uses a durable nonce if its first instruction
    /// advances a nonce account. In that case the recent blockhash is the
    /// nonce value.
    pub fn is_nonce_transaction(&self) -> bool {
        self.instructions.first().is_some_and(|ix| {
            ix.program_id == system_program::id()
                && ix.instruction_type.as_deref()
                    == Some(ADVANCE_NONCE_INSTRUCTION_TYPE)
        })
    }

    /// Whether the account is invoked as a program by any instruction.
    pub fn is_program(&self, pubkey: &Pubkey) -> bool {
        self.instructions.iter().any(|ix| &ix.program_id == pubkey)
    }
}

fn parse_pubkey(
    signature: &Signature,
    pubkey: &str,
) -> MagicBlockRpcClientResult<Pubkey> {
    Pubkey::from_str(pubkey).map_err(|_| {
        MagicBlockRpcClientError::InvalidPubkey(*signature, pubkey.to_string())
    })
}

fn raw_account_keys(
    signature: &Signature,
    message: &UiRawMessage,
) -> MagicBlockRpcClientResult<Vec<AccountKey>> {
    let header = &message.header;
    let num_keys = message.account_keys.len();
    let num_signed = header.num_required_signatures as usize;
    let num_writable_signed =
        num_signed.saturating_sub(header.num_readonly_signed_accounts as usize);
    let num_writable_unsigned = num_keys
        .saturating_sub(header.num_readonly_unsigned_accounts as usize);

    message
        .account_keys
        .iter()
        .enumerate()
        .map(|(idx, pubkey)| {
            let signer = idx < num_signed;
            let writable = if signer {
                idx < num_writable_signed
            } else {
                idx < num_writable_unsigned
            };
            Ok(AccountKey {
                pubkey: parse_pubkey(signature, pubkey)?,
                writable,
                signer,
            })
        })
        .collect()
}

fn instruction_info(
    signature: &Signature,
    account_keys: &[AccountKey],
    ix: &UiInstruction,
) -> MagicBlockRpcClientResult<InstructionInfo> {
    match ix {
        UiInstruction::Compiled(ix) => {
            compiled_instruction_info(signature, account_keys, ix)
        }
        UiInstruction::Parsed(UiParsedInstruction::Parsed(ix)) => {
            Ok(InstructionInfo {
                program_id: parse_pubkey(signature, &ix.program_id)?,
                program: Some(ix.program.clone()),
                instruction_type: ix
                    .parsed
                    .get("type")
                    .and_then(|ty| ty.as_str())
                    .map(str::to_string),
            })
        }
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(ix)) => {
            Ok(InstructionInfo {
                program_id: parse_pubkey(signature, &ix.program_id)?,
                program: None,
                instruction_type: None,
            })
        }
    }
}

fn compiled_instruction_info(
    signature: &Signature,
    account_keys: &[AccountKey],
    ix: &UiCompiledInstruction,
) -> MagicBlockRpcClientResult<InstructionInfo> {
    let program_id = account_keys
        .get(ix.program_id_index as usize)
        .map(|key| key.pubkey)
        .ok_or(MagicBlockRpcClientError::AccountIndexOutOfBounds(
            *signature,
            ix.program_id_index,
            account_keys.len(),
        ))?;
    // Only system instructions are decoded since they are the only ones
    // we need to detect durable nonce transactions
    let instruction_type = if program_id == system_program::id() {
        bs58::decode(&ix.data)
            .into_vec()
            .ok()
            .and_then(|data| {
                bincode::deserialize::<SystemInstruction>(&data).ok()
            })
            .map(|ix| system_instruction_type(&ix).to_string())
    } else {
        None
    };
    Ok(InstructionInfo {
        program_id,
        program: None,
        instruction_type,
    })
}

fn system_instruction_type(ix: &SystemInstruction) -> &'static str {
    use SystemInstruction::*;
    match ix {
        CreateAccount { .. } => "createAccount",
        Assign { .. } => "assign",
        Transfer { .. } => "transfer",
        CreateAccountWithSeed { .. } => "createAccountWithSeed",
        AdvanceNonceAccount => ADVANCE_NONCE_INSTRUCTION_TYPE,
        WithdrawNonceAccount(_) => "withdrawFromNonce",
        InitializeNonceAccount(_) => "initializeNonce",
        AuthorizeNonceAccount(_) => "authorizeNonce",
        Allocate { .. } => "allocate",
        AllocateWithSeed { .. } => "allocateWithSeed",
        AssignWithSeed { .. } => "assignWithSeed",
        TransferWithSeed { .. } => "transferWithSeed",
        UpgradeNonceAccount => "upgradeNonce",
    }
}
