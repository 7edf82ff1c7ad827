use std::fmt;

use solana_sdk::clock::{Slot, UnixTimestamp};
use solana_transaction_status_client_types::{
    TransactionConfirmationStatus, TransactionStatus,
};

/// Number of confirmations reported for a transaction.
/// Once the slot of the transaction is rooted the cluster stops counting
/// and reports no number at all, which we model as [Confirmations::Max].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmations {
    Count(usize),
    Max,
}

impl Confirmations {
    pub fn is_max(&self) -> bool {
        matches!(self, Confirmations::Max)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Confirmations::Count(0))
    }
}

impl From<Option<usize>> for Confirmations {
    fn from(confirmations: Option<usize>) -> Self {
        match confirmations {
            Some(count) => Confirmations::Count(count),
            None => Confirmations::Max,
        }
    }
}

impl fmt::Display for Confirmations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmations::Count(count) => write!(f, "{count}"),
            Confirmations::Max => write!(f, "max"),
        }
    }
}

/// Block time of the slot that included the transaction.
/// Only confirmed blocks carry a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTimestamp {
    Unix(UnixTimestamp),
    Unavailable,
}

impl From<Option<UnixTimestamp>> for BlockTimestamp {
    fn from(timestamp: Option<UnixTimestamp>) -> Self {
        timestamp
            .map(BlockTimestamp::Unix)
            .unwrap_or(BlockTimestamp::Unavailable)
    }
}

/// Latest known status of a transaction signature as reported by the
/// cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub slot: Slot,
    pub confirmations: Confirmations,
    pub confirmation_status: Option<String>,
    /// Error the transaction failed with, `None` if it succeeded
    pub error: Option<String>,
    pub timestamp: BlockTimestamp,
}

impl StatusInfo {
    pub fn from_transaction_status(
        status: &TransactionStatus,
        timestamp: BlockTimestamp,
    ) -> Self {
        Self {
            slot: status.slot,
            confirmations: status.confirmations.into(),
            confirmation_status: status
                .confirmation_status
                .as_ref()
                .map(confirmation_status_str)
                .map(str::to_string),
            error: status.err.as_ref().map(|err| err.to_string()),
            timestamp,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn confirmation_status_str(status: &TransactionConfirmationStatus) -> &str {
    use TransactionConfirmationStatus::*;
    match status {
        Processed => "processed",
        Confirmed => "confirmed",
        Finalized => "finalized",
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::transaction::TransactionError;

    use super::*;

    fn transaction_status(confirmations: Option<usize>) -> TransactionStatus {
        TransactionStatus {
            slot: 42,
            confirmations,
            status: Ok(()),
            err: None,
            confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
        }
    }

    #[test]
    fn test_rooted_status_reports_max_confirmations() {
        let info = StatusInfo::from_transaction_status(
            &transaction_status(None),
            BlockTimestamp::Unix(1_700_000_000),
        );
        assert_eq!(info.confirmations, Confirmations::Max);
        assert_eq!(info.confirmation_status.as_deref(), Some("confirmed"));
        assert_eq!(info.timestamp, BlockTimestamp::Unix(1_700_000_000));
        assert!(info.succeeded());
    }

    #[test]
    fn test_counted_status_keeps_confirmations() {
        let info = StatusInfo::from_transaction_status(
            &transaction_status(Some(0)),
            BlockTimestamp::Unavailable,
        );
        assert_eq!(info.confirmations, Confirmations::Count(0));
        assert!(info.confirmations.is_zero());
        assert!(!info.confirmations.is_max());
        assert_eq!(info.confirmations.to_string(), "0");
    }

    #[test]
    fn test_failed_transaction_carries_error() {
        let mut status = transaction_status(Some(3));
        status.err = Some(TransactionError::AccountNotFound);
        status.status = Err(TransactionError::AccountNotFound);
        let info = StatusInfo::from_transaction_status(
            &status,
            BlockTimestamp::Unavailable,
        );
        assert!(!info.succeeded());
        assert_eq!(
            info.error.as_deref(),
            Some(TransactionError::AccountNotFound.to_string().as_str())
        );
    }
}
