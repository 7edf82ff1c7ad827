use async_trait::async_trait;
use magicblock_rpc_client::{DetailInfo, MagicblockRpcClient, StatusInfo};
use solana_sdk::{clock::Slot, signature::Signature};

use crate::errors::TxWatchResult;

// -----------------
// Trait
// -----------------

/// Data source the watcher fetches transaction state from.
#[async_trait]
pub trait LedgerSource: Send + Sync + 'static {
    /// Status of the transaction searching the full history of the ledger.
    /// Returns `None` if the ledger does not know the signature.
    async fn get_status(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<StatusInfo>>;

    /// Full details of the transaction.
    /// Returns `None` if the ledger does not have the transaction.
    async fn get_detail(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<DetailInfo>>;

    /// The oldest block the ledger still holds.
    async fn get_first_available_block(&self) -> TxWatchResult<Slot>;
}

// -----------------
// Implementation
// -----------------
#[async_trait]
impl LedgerSource for MagicblockRpcClient {
    async fn get_status(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<StatusInfo>> {
        Ok(self.get_signature_status_info(signature).await?)
    }

    async fn get_detail(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<DetailInfo>> {
        Ok(self.get_transaction_detail(signature).await?)
    }

    async fn get_first_available_block(&self) -> TxWatchResult<Slot> {
        Ok(MagicblockRpcClient::get_first_available_block(self).await?)
    }
}
