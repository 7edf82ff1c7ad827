use magicblock_rpc_client::StatusInfo;

use crate::zero_confirmation::ZeroConfirmationCounter;

/// Whether the status of an observed transaction is being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoRefreshMode {
    /// The transaction has not reached max confirmations yet and we keep
    /// polling its status.
    Active,
    /// Nothing to poll, either the transaction reached max confirmations or
    /// we have no status for it.
    Inactive,
    /// We stopped polling since the transaction kept reporting zero
    /// confirmations.
    BailedOut,
}

impl AutoRefreshMode {
    pub fn is_active(&self) -> bool {
        matches!(self, AutoRefreshMode::Active)
    }

    pub fn is_bailed_out(&self) -> bool {
        matches!(self, AutoRefreshMode::BailedOut)
    }

    /// Both active and bailed out mean that the transaction did not reach
    /// max confirmations and thus has no details available yet.
    pub fn awaits_max_confirmations(&self) -> bool {
        matches!(self, AutoRefreshMode::Active | AutoRefreshMode::BailedOut)
    }
}

/// Derives the auto refresh mode from the zero confirmation counter and the
/// latest known status.
/// Bailing out takes precedence, otherwise a transaction that got stuck at
/// zero confirmations would be polled forever.
pub fn classify(
    counter: &ZeroConfirmationCounter,
    info: Option<&StatusInfo>,
) -> AutoRefreshMode {
    if counter.is_bailed_out() {
        return AutoRefreshMode::BailedOut;
    }
    match info {
        Some(info) if !info.confirmations.is_max() => AutoRefreshMode::Active,
        _ => AutoRefreshMode::Inactive,
    }
}
