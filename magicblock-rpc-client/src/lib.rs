#![allow(clippy::result_large_err)]
use std::sync::Arc;

use log::*;
use serde_json::json;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::{config::RpcTransactionConfig, request::RpcRequest};
use solana_sdk::{
    clock::Slot, commitment_config::CommitmentConfig, signature::Signature,
};
use solana_transaction_status_client_types::{
    EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding,
};

mod detail;
mod status;

pub use detail::{
    AccountKey, DetailInfo, InstructionInfo, TokenBalance, TransactionMeta,
    ADVANCE_NONCE_INSTRUCTION_TYPE,
};
pub use status::{BlockTimestamp, Confirmations, StatusInfo};

/// The encoding to use when requesting transaction details
pub const TRANSACTION_DETAIL_ENCODING: UiTransactionEncoding =
    UiTransactionEncoding::JsonParsed;

/// Highest transaction version we are able to display
pub const MAX_SUPPORTED_TRANSACTION_VERSION: u8 = 0;

// -----------------
// MagicBlockRpcClientError
// -----------------
#[derive(Debug, thiserror::Error)]
pub enum MagicBlockRpcClientError {
    #[error("RPC Client error: {0}")]
    RpcClientError(#[from] solana_rpc_client_api::client_error::Error),

    #[error("Error getting slot: {0} ({0:?})")]
    GetSlot(solana_rpc_client_api::client_error::Error),

    #[error("Error getting first available block: {0} ({0:?})")]
    GetFirstAvailableBlock(solana_rpc_client_api::client_error::Error),

    #[error("Error getting signature status for: {0} {1}")]
    CannotGetTransactionSignatureStatus(
        Signature,
        solana_rpc_client_api::client_error::Error,
    ),

    #[error("Error getting transaction details for: {0} {1}")]
    CannotGetTransaction(Signature, solana_rpc_client_api::client_error::Error),

    #[error("Transaction {0} was not returned in json encoding")]
    UnsupportedTransactionEncoding(Signature),

    #[error("Transaction {0} contains an invalid pubkey: {1}")]
    InvalidPubkey(Signature, String),

    #[error(
        "Transaction {0} references account index {1} but only has {2} account keys"
    )]
    AccountIndexOutOfBounds(Signature, u8, usize),

    #[error("Transaction {0} contains an invalid token amount: {1}")]
    InvalidTokenAmount(Signature, String),
}

pub type MagicBlockRpcClientResult<T> =
    std::result::Result<T, MagicBlockRpcClientError>;

// -----------------
// MagicblockRpcClient
// -----------------

/// Wraps a [RpcClient] to provide the lookups needed to explore a single
/// transaction: its confirmation status and its full details.
#[derive(Clone)]
pub struct MagicblockRpcClient {
    client: Arc<RpcClient>,
}

impl From<RpcClient> for MagicblockRpcClient {
    fn from(client: RpcClient) -> Self {
        Self::new(Arc::new(client))
    }
}

impl MagicblockRpcClient {
    /// Create a new [MagicblockRpcClient] from an existing [RpcClient].
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn new_from_url(url: &str, commitment: CommitmentConfig) -> Self {
        RpcClient::new_with_commitment(url.to_string(), commitment).into()
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.client.commitment()
    }

    pub async fn get_slot(&self) -> MagicBlockRpcClientResult<Slot> {
        self.client
            .get_slot()
            .await
            .map_err(MagicBlockRpcClientError::GetSlot)
    }

    /// The oldest block the cluster still holds in its history.
    /// Transactions processed before it cannot be found.
    pub async fn get_first_available_block(
        &self,
    ) -> MagicBlockRpcClientResult<Slot> {
        self.client
            .get_first_available_block()
            .await
            .map_err(MagicBlockRpcClientError::GetFirstAvailableBlock)
    }

    /// Looks up the status of the transaction, searching the full
    /// transaction history of the cluster.
    /// Returns `None` if the cluster does not know the signature.
    ///
    /// The block time is requested separately and is reported as
    /// unavailable if that lookup fails, since only confirmed blocks have
    /// one.
    pub async fn get_signature_status_info(
        &self,
        signature: &Signature,
    ) -> MagicBlockRpcClientResult<Option<StatusInfo>> {
        let statuses = self
            .client
            .get_signature_statuses_with_history(&[*signature])
            .await
            .map_err(|err| {
                MagicBlockRpcClientError::CannotGetTransactionSignatureStatus(
                    *signature, err,
                )
            })?;
        let Some(status) = statuses.value.into_iter().next().flatten() else {
            trace!("No status found for {signature}");
            return Ok(None);
        };

        let timestamp = match self.client.get_block_time(status.slot).await {
            Ok(block_time) => BlockTimestamp::Unix(block_time),
            Err(err) => {
                trace!(
                    "Block time for slot {} unavailable: {:?}",
                    status.slot,
                    err
                );
                BlockTimestamp::Unavailable
            }
        };

        Ok(Some(StatusInfo::from_transaction_status(&status, timestamp)))
    }

    /// Fetches the full transaction including its metadata.
    /// Returns `None` if the cluster does not have the transaction.
    pub async fn get_transaction_detail(
        &self,
        signature: &Signature,
    ) -> MagicBlockRpcClientResult<Option<DetailInfo>> {
        let config = RpcTransactionConfig {
            encoding: Some(TRANSACTION_DETAIL_ENCODING),
            commitment: Some(self.commitment()),
            max_supported_transaction_version: Some(
                MAX_SUPPORTED_TRANSACTION_VERSION,
            ),
        };
        // The typed getter of the client fails to deserialize the `null`
        // result the node returns for unknown transactions, thus we send
        // the request ourselves.
        let tx = self
            .client
            .send::<Option<EncodedConfirmedTransactionWithStatusMeta>>(
                RpcRequest::GetTransaction,
                json!([signature.to_string(), config]),
            )
            .await
            .map_err(|err| {
                MagicBlockRpcClientError::CannotGetTransaction(*signature, err)
            })?;

        tx.map(|tx| DetailInfo::try_from_encoded(signature, tx))
            .transpose()
    }

    pub fn get_inner(&self) -> &Arc<RpcClient> {
        &self.client
    }
}
