use magicblock_rpc_client::MagicBlockRpcClientError;
use solana_sdk::signature::Signature;
use thiserror::Error;

pub type TxWatchResult<T> = Result<T, TxWatchError>;

#[derive(Error, Debug)]
pub enum TxWatchError {
    #[error("Signature \"{0}\" is not valid")]
    InvalidSignature(String),

    #[error("Signature {0} is not being observed")]
    NotObserved(Signature),

    #[error("No transaction signature is shown")]
    NoSignatureShown,

    #[error("Invalid watcher config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    ConfigDeserialize(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    RpcClient(#[from] MagicBlockRpcClientError),

    #[error("Ledger source error: {0}")]
    LedgerSource(String),
}
