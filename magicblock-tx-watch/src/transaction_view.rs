use solana_sdk::signature::Signature;

use crate::{
    auto_refresh::AutoRefreshMode,
    errors::{TxWatchError, TxWatchResult},
    ledger_source::LedgerSource,
    presentation::{AccountsCard, StatusCard, TransactionSnapshot},
    signature::parse_signature,
    watcher::TransactionWatcher,
};

/// Shows one transaction at a time.
///
/// Switching to another signature stops observing the previous one before
/// the new one is observed, dropping the view stops observing altogether.
/// If the signature was observed already when the view switched to it, the
/// view leaves the observation running when it lets go of it.
pub struct TransactionView<S: LedgerSource> {
    watcher: TransactionWatcher<S>,
    signature: Option<Signature>,
    owns_observation: bool,
}

impl<S: LedgerSource> TransactionView<S> {
    pub fn new(watcher: TransactionWatcher<S>) -> Self {
        Self {
            watcher,
            signature: None,
            owns_observation: false,
        }
    }

    pub fn watcher(&self) -> &TransactionWatcher<S> {
        &self.watcher
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn set_signature(&mut self, signature: Signature) {
        if self.signature == Some(signature) {
            return;
        }
        self.clear();
        self.owns_observation = self.watcher.observe(signature);
        self.signature = Some(signature);
    }

    /// Parses the base58 encoded signature and shows it.
    /// An invalid signature leaves the view unchanged.
    pub fn set_raw_signature(&mut self, raw: &str) -> TxWatchResult<Signature> {
        let signature = parse_signature(raw)?;
        self.set_signature(signature);
        Ok(signature)
    }

    pub fn clear(&mut self) {
        if let Some(signature) = self.signature.take() {
            if self.owns_observation {
                self.watcher.stop_observing(&signature);
            }
            self.owns_observation = false;
        }
    }

    pub fn mode(&self) -> Option<AutoRefreshMode> {
        self.signature
            .and_then(|signature| self.watcher.current_mode(&signature))
    }

    pub fn snapshot(&self) -> Option<TransactionSnapshot> {
        self.signature
            .and_then(|signature| self.watcher.snapshot(&signature))
    }

    pub fn status_card(&self) -> Option<StatusCard> {
        self.snapshot().map(|snapshot| snapshot.status_card())
    }

    pub fn accounts_card(&self) -> Option<AccountsCard> {
        self.snapshot().and_then(|snapshot| snapshot.accounts_card())
    }

    /// Requests the status of the shown transaction once more.
    pub fn refresh_status(&self) -> TxWatchResult<()> {
        self.watcher.request_manual_retry(&self.shown_signature()?)
    }

    /// Requests the details of the shown transaction once more if their
    /// fetch failed.
    pub fn refresh_details(&self) -> TxWatchResult<()> {
        self.watcher.request_detail_retry(&self.shown_signature()?)
    }

    fn shown_signature(&self) -> TxWatchResult<Signature> {
        self.signature.ok_or(TxWatchError::NoSignatureShown)
    }
}

impl<S: LedgerSource> Drop for TransactionView<S> {
    fn drop(&mut self) {
        self.clear();
    }
}
