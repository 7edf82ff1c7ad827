use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use log::*;
use magicblock_rpc_client::{DetailInfo, StatusInfo};
use solana_sdk::{clock::Slot, signature::Signature};
use tokio::sync::watch;

use crate::{
    errors::{TxWatchError, TxWatchResult},
    ledger_source::LedgerSource,
};

type Responses<T> = HashMap<Signature, VecDeque<Result<Option<T>, String>>>;

/// Ledger source that replays scripted responses per signature.
///
/// Responses are handed out in the order they were added and the last one
/// is repeated for all further requests. Signatures without responses are
/// reported as not found.
pub struct LedgerSourceMock {
    statuses: Mutex<Responses<StatusInfo>>,
    details: Mutex<Responses<DetailInfo>>,
    status_calls: Mutex<HashMap<Signature, usize>>,
    detail_calls: Mutex<HashMap<Signature, usize>>,
    first_available_block: Mutex<Result<Slot, String>>,
    /// While `false` status requests are held before they respond
    status_gate: watch::Sender<bool>,
}

impl Default for LedgerSourceMock {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerSourceMock {
    pub fn new() -> Self {
        let (status_gate, _) = watch::channel(true);
        Self {
            statuses: Default::default(),
            details: Default::default(),
            status_calls: Default::default(),
            detail_calls: Default::default(),
            first_available_block: Mutex::new(Ok(0)),
            status_gate,
        }
    }

    // -----------------
    // Scripting
    // -----------------
    pub fn add_status(&self, signature: Signature, info: StatusInfo) {
        self.add_status_response(signature, Ok(Some(info)));
    }

    pub fn add_status_not_found(&self, signature: Signature) {
        self.add_status_response(signature, Ok(None));
    }

    pub fn add_status_error(&self, signature: Signature, error: &str) {
        self.add_status_response(signature, Err(error.to_string()));
    }

    pub fn add_status_response(
        &self,
        signature: Signature,
        response: Result<Option<StatusInfo>, String>,
    ) {
        self.statuses
            .lock()
            .unwrap()
            .entry(signature)
            .or_default()
            .push_back(response);
    }

    pub fn add_detail(&self, signature: Signature, detail: DetailInfo) {
        self.add_detail_response(signature, Ok(Some(detail)));
    }

    pub fn add_detail_error(&self, signature: Signature, error: &str) {
        self.add_detail_response(signature, Err(error.to_string()));
    }

    pub fn add_detail_response(
        &self,
        signature: Signature,
        response: Result<Option<DetailInfo>, String>,
    ) {
        self.details
            .lock()
            .unwrap()
            .entry(signature)
            .or_default()
            .push_back(response);
    }

    /// Drops remaining scripted status responses for the signature.
    pub fn clear_statuses(&self, signature: &Signature) {
        self.statuses.lock().unwrap().remove(signature);
    }

    /// Drops remaining scripted detail responses for the signature.
    pub fn clear_details(&self, signature: &Signature) {
        self.details.lock().unwrap().remove(signature);
    }

    pub fn set_first_available_block(&self, block: Result<Slot, String>) {
        *self.first_available_block.lock().unwrap() = block;
    }

    /// Status requests made from now on wait until
    /// [Self::release_status_responses] is called.
    pub fn hold_status_responses(&self) {
        self.status_gate.send_replace(false);
    }

    pub fn release_status_responses(&self) {
        self.status_gate.send_replace(true);
    }

    // -----------------
    // Inspection
    // -----------------
    pub fn status_calls(&self, signature: &Signature) -> usize {
        Self::calls(&self.status_calls, signature)
    }

    pub fn detail_calls(&self, signature: &Signature) -> usize {
        Self::calls(&self.detail_calls, signature)
    }

    fn calls(
        calls: &Mutex<HashMap<Signature, usize>>,
        signature: &Signature,
    ) -> usize {
        calls.lock().unwrap().get(signature).copied().unwrap_or_default()
    }

    fn record_call(
        calls: &Mutex<HashMap<Signature, usize>>,
        signature: &Signature,
    ) {
        *calls.lock().unwrap().entry(*signature).or_default() += 1;
    }

    fn next_response<T: Clone>(
        responses: &Mutex<Responses<T>>,
        signature: &Signature,
    ) -> TxWatchResult<Option<T>> {
        let mut responses = responses.lock().unwrap();
        let response = match responses.get_mut(signature) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        response
            .unwrap_or(Ok(None))
            .map_err(TxWatchError::LedgerSource)
    }
}

#[async_trait]
impl LedgerSource for LedgerSourceMock {
    async fn get_status(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<StatusInfo>> {
        Self::record_call(&self.status_calls, signature);
        trace!("Mock status request for {signature}");

        let mut gate = self.status_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        Self::next_response(&self.statuses, signature)
    }

    async fn get_detail(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<Option<DetailInfo>> {
        Self::record_call(&self.detail_calls, signature);
        trace!("Mock detail request for {signature}");
        Self::next_response(&self.details, signature)
    }

    async fn get_first_available_block(&self) -> TxWatchResult<Slot> {
        self.first_available_block
            .lock()
            .unwrap()
            .clone()
            .map_err(TxWatchError::LedgerSource)
    }
}
