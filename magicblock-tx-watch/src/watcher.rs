use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};

use log::*;
use magicblock_rpc_client::{DetailInfo, StatusInfo};
use solana_sdk::signature::Signature;
use tokio::{select, sync::watch};
use tokio_util::sync::CancellationToken;

use crate::{
    auto_refresh::{classify, AutoRefreshMode},
    cluster::ClusterState,
    config::WatcherConfig,
    errors::{TxWatchError, TxWatchResult},
    fetch_cache::{FetchCache, FetchCompletion, FetchRecord},
    ledger_source::LedgerSource,
    poller::StatusPoller,
    sequencer::{detail_retry_action, next_detail_action, DetailAction},
    zero_confirmation::ZeroConfirmationCounter,
};

/// Status record of a signature, `Fetched(None)` if the ledger does not
/// know it.
pub type StatusRecord = FetchRecord<Option<StatusInfo>>;
/// Detail record of a signature, `Fetched(None)` if the ledger does not
/// have the transaction.
pub type DetailRecord = FetchRecord<Option<DetailInfo>>;

pub type StatusCache = FetchCache<Signature, Option<StatusInfo>>;
pub type DetailCache = FetchCache<Signature, Option<DetailInfo>>;

// -----------------
// Observation
// -----------------
struct Observation {
    /// Results tagged with a different generation belong to an earlier
    /// observation of the same signature and are discarded
    generation: u64,
    counter: ZeroConfirmationCounter,
    latest_info: Option<StatusInfo>,
    /// Cache version of the last status completion that was applied
    last_applied_version: u64,
    poller: StatusPoller,
    cancel: CancellationToken,
}

impl Observation {
    fn mode(&self) -> AutoRefreshMode {
        classify(&self.counter, self.latest_info.as_ref())
    }
}

// -----------------
// TransactionWatcher
// -----------------
struct WatcherInner<S: LedgerSource> {
    source: Arc<S>,
    config: WatcherConfig,
    status_cache: StatusCache,
    detail_cache: DetailCache,
    cluster: watch::Receiver<ClusterState>,
    observations: Mutex<HashMap<Signature, Observation>>,
    next_generation: AtomicU64,
    cancel: CancellationToken,
}

impl<S: LedgerSource> Drop for WatcherInner<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keeps the status of observed transactions up to date.
///
/// The status of an observed signature is polled until it reaches max
/// confirmations, at which point its details are fetched once. Polling
/// stops early if the transaction keeps reporting zero confirmations and
/// can be resumed via [Self::request_manual_retry].
pub struct TransactionWatcher<S: LedgerSource> {
    inner: Arc<WatcherInner<S>>,
}

impl<S: LedgerSource> Clone for TransactionWatcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Handle held by spawned timers and fetches, it does not keep the
/// watcher alive once all [TransactionWatcher]s are dropped.
struct WeakWatcher<S: LedgerSource> {
    inner: Weak<WatcherInner<S>>,
}

impl<S: LedgerSource> WeakWatcher<S> {
    fn upgrade(&self) -> Option<TransactionWatcher<S>> {
        self.inner
            .upgrade()
            .map(|inner| TransactionWatcher { inner })
    }
}

impl<S: LedgerSource> TransactionWatcher<S> {
    pub fn new(
        source: Arc<S>,
        config: WatcherConfig,
        cluster: watch::Receiver<ClusterState>,
    ) -> Self {
        Self::with_caches(
            source,
            config,
            cluster,
            StatusCache::default(),
            DetailCache::default(),
        )
    }

    /// Creates a watcher that shares the provided caches, i.e. with other
    /// watchers.
    pub fn with_caches(
        source: Arc<S>,
        config: WatcherConfig,
        cluster: watch::Receiver<ClusterState>,
        status_cache: StatusCache,
        detail_cache: DetailCache,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                source,
                config,
                status_cache,
                detail_cache,
                cluster,
                observations: Default::default(),
                next_generation: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }

    pub fn cluster_state(&self) -> ClusterState {
        self.inner.cluster.borrow().clone()
    }

    pub fn status_cache(&self) -> &StatusCache {
        &self.inner.status_cache
    }

    pub fn detail_cache(&self) -> &DetailCache {
        &self.inner.detail_cache
    }

    // -----------------
    // Observation Lifecycle
    // -----------------

    /// Starts observing the signature.
    /// A status record that is already cached is applied as the first
    /// observation, otherwise the status is fetched as soon as the cluster
    /// is connected.
    /// Observing a signature that is observed already does nothing and
    /// returns `false`.
    pub fn observe(&self, signature: Signature) -> bool {
        let (generation, cancel, completion) = {
            let mut observations = self.lock_observations();
            if self.inner.cancel.is_cancelled() {
                warn!("Watcher is shut down, not observing {signature}");
                return false;
            }
            if observations.contains_key(&signature) {
                trace!("Already observing {signature}");
                return false;
            }
            let generation =
                self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
            let cancel = self.inner.cancel.child_token();
            observations.insert(
                signature,
                Observation {
                    generation,
                    counter: ZeroConfirmationCounter::new(
                        self.inner.config.zero_confirmation_bailout,
                    ),
                    latest_info: None,
                    last_applied_version: 0,
                    poller: StatusPoller::new(),
                    cancel: cancel.clone(),
                },
            );
            // A fetch in flight yields no completion and is joined by the
            // initial fetch instead
            let completion =
                self.inner.status_cache.get_completion(&signature);
            (generation, cancel, completion)
        };
        debug!("Observing {signature} (generation {generation})");

        match completion {
            Some(completion) => {
                self.seed_status(signature, generation, completion)
            }
            None => self.spawn_status_fetch(signature, generation, cancel),
        }
        true
    }

    /// Stops observing the signature, disarming its timer.
    /// Results of fetches still in flight are discarded once they arrive.
    /// Returns `false` if the signature was not observed.
    pub fn stop_observing(&self, signature: &Signature) -> bool {
        let Some(mut observation) = self.lock_observations().remove(signature)
        else {
            return false;
        };
        observation.poller.disarm();
        observation.cancel.cancel();
        debug!(
            "Stopped observing {signature} (generation {})",
            observation.generation
        );
        true
    }

    /// Stops observing all signatures.
    /// Signatures can no longer be observed afterwards.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut observations = self.lock_observations();
        for (_, mut observation) in observations.drain() {
            observation.poller.disarm();
        }
        debug!("Transaction watcher shut down");
    }

    /// Requests the status once more.
    /// If polling bailed out the zero confirmation count is reset once the
    /// fetch starts which gives the transaction a fresh allowance before
    /// we bail out again.
    pub fn request_manual_retry(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<()> {
        let (generation, cancel) = {
            let mut observations = self.lock_observations();
            let observation = observations
                .get_mut(signature)
                .ok_or(TxWatchError::NotObserved(*signature))?;
            observation.poller.disarm();
            (observation.generation, observation.cancel.clone())
        };
        self.spawn_status_fetch(*signature, generation, cancel);
        Ok(())
    }

    /// Requests the details once more if their previous fetch failed.
    pub fn request_detail_retry(
        &self,
        signature: &Signature,
    ) -> TxWatchResult<()> {
        let observations = self.lock_observations();
        if !observations.contains_key(signature) {
            return Err(TxWatchError::NotObserved(*signature));
        }
        let action = detail_retry_action(
            self.inner.status_cache.get_record(signature).as_ref(),
            self.inner.detail_cache.get_record(signature).as_ref(),
        );
        match action {
            DetailAction::Fetch => self.fetch_detail(*signature),
            _ => trace!("Not retrying details of {signature}: {action:?}"),
        }
        Ok(())
    }

    // -----------------
    // Status
    // -----------------
    fn spawn_status_fetch(
        &self,
        signature: Signature,
        generation: u64,
        cancel: CancellationToken,
    ) {
        let watcher = self.downgrade();
        let cluster = self.inner.cluster.clone();
        tokio::spawn(async move {
            let connected = select! {
                biased;
                _ = cancel.cancelled() => false,
                connected = wait_until_connected(cluster) => {
                    if !connected {
                        warn!("Cluster monitor is gone, cannot fetch status of {signature}");
                    }
                    connected
                }
            };
            if !connected {
                return;
            }
            if let Some(watcher) = watcher.upgrade() {
                watcher.fetch_status(signature, generation).await;
            }
        });
    }

    async fn fetch_status(&self, signature: Signature, generation: u64) {
        {
            let mut observations = self.lock_observations();
            let Some(observation) = observations
                .get_mut(&signature)
                .filter(|observation| observation.generation == generation)
            else {
                trace!("Not fetching status of {signature} for stale generation {generation}");
                return;
            };
            if observation.mode().is_bailed_out() {
                debug!(
                    "Retrying {signature} after bailing out at {} zero confirmation observations",
                    observation.counter.count()
                );
                observation.counter.reset_on_new_cycle();
            }
        }
        let source = self.inner.source.clone();
        let completion = self
            .inner
            .status_cache
            .fetch(signature, async move {
                source
                    .get_status(&signature)
                    .await
                    .map_err(|err| err.to_string())
            })
            .await;
        self.apply_status(signature, generation, completion);
    }

    fn seed_status(
        &self,
        signature: Signature,
        generation: u64,
        completion: FetchCompletion<Option<StatusInfo>>,
    ) {
        {
            let mut observations = self.lock_observations();
            let Some(observation) = observations
                .get_mut(&signature)
                .filter(|observation| observation.generation == generation)
            else {
                return;
            };
            trace!(
                "Seeding {signature} from cached status version {}",
                completion.version
            );
            observation.last_applied_version = completion.version;
            if let Ok(info) = completion.result {
                observation.latest_info = info;
            }
            if observation.mode().is_active() {
                self.arm_timer(signature, observation);
            }
        }
        self.sequence_detail(&signature);
    }

    fn apply_status(
        &self,
        signature: Signature,
        generation: u64,
        completion: FetchCompletion<Option<StatusInfo>>,
    ) {
        {
            let mut observations = self.lock_observations();
            let Some(observation) = observations
                .get_mut(&signature)
                .filter(|observation| observation.generation == generation)
            else {
                trace!("Discarding status of {signature} for stale generation {generation}");
                return;
            };
            if completion.version <= observation.last_applied_version {
                trace!(
                    "Status version {} of {signature} was applied already",
                    completion.version
                );
                return;
            }
            observation.last_applied_version = completion.version;

            let fetched = match completion.result {
                Ok(Some(info)) => {
                    observation.counter.observe(&info);
                    observation.latest_info = Some(info);
                    true
                }
                Ok(None) => {
                    debug!("Transaction {signature} not found");
                    observation.latest_info = None;
                    true
                }
                Err(err) => {
                    warn!("Failed to fetch status of {signature}: {err}");
                    false
                }
            };

            let mode = observation.mode();
            if fetched && mode.is_active() {
                self.arm_timer(signature, observation);
            } else {
                if mode.is_bailed_out() {
                    debug!(
                        "Bailed out of polling {signature} after {} zero confirmation observations",
                        observation.counter.count()
                    );
                }
                observation.poller.disarm();
            }
        }
        self.sequence_detail(&signature);
    }

    fn arm_timer(&self, signature: Signature, observation: &mut Observation) {
        let watcher = self.downgrade();
        let generation = observation.generation;
        observation.poller.arm(
            self.inner.config.auto_refresh_interval(),
            &observation.cancel,
            move |timer_id| async move {
                let Some(watcher) = watcher.upgrade() else {
                    trace!("Watcher of {signature} is gone");
                    return;
                };
                watcher.on_timer_fired(signature, generation, timer_id).await
            },
        );
    }

    async fn on_timer_fired(
        &self,
        signature: Signature,
        generation: u64,
        timer_id: u64,
    ) {
        let fired = {
            let mut observations = self.lock_observations();
            observations
                .get_mut(&signature)
                .filter(|observation| observation.generation == generation)
                .is_some_and(|observation| observation.poller.fire(timer_id))
        };
        if fired {
            self.fetch_status(signature, generation).await;
        } else {
            trace!("Ignoring stale timer {timer_id} of {signature}");
        }
    }

    // -----------------
    // Detail
    // -----------------

    /// Fetches the details once the status reached max confirmations.
    /// Holding the observations lock while deciding serializes concurrent
    /// invocations, thus details are requested at most once.
    fn sequence_detail(&self, signature: &Signature) {
        let observations = self.lock_observations();
        if !observations.contains_key(signature) {
            return;
        }
        let action = next_detail_action(
            self.inner.status_cache.get_record(signature).as_ref(),
            self.inner.detail_cache.get_record(signature).as_ref(),
        );
        if action == DetailAction::Fetch {
            self.fetch_detail(*signature);
        }
    }

    fn fetch_detail(&self, signature: Signature) {
        debug!("Fetching details of {signature}");
        let source = self.inner.source.clone();
        // Driven by the cache, the result is picked up from there
        drop(self.inner.detail_cache.fetch(signature, async move {
            source.get_detail(&signature).await.map_err(|err| {
                warn!("Failed to fetch details of {signature}: {err}");
                err.to_string()
            })
        }));
    }

    // -----------------
    // Accessors
    // -----------------
    pub fn is_observed(&self, signature: &Signature) -> bool {
        self.lock_observations().contains_key(signature)
    }

    pub fn observed_count(&self) -> usize {
        self.lock_observations().len()
    }

    /// Returns `None` if the signature is not observed.
    pub fn current_mode(
        &self,
        signature: &Signature,
    ) -> Option<AutoRefreshMode> {
        self.lock_observations()
            .get(signature)
            .map(Observation::mode)
    }

    /// Returns `None` if the status was never requested.
    pub fn current_status(
        &self,
        signature: &Signature,
    ) -> Option<StatusRecord> {
        self.inner.status_cache.get_record(signature)
    }

    /// Returns `None` if the details were never requested.
    pub fn current_detail(
        &self,
        signature: &Signature,
    ) -> Option<DetailRecord> {
        self.inner.detail_cache.get_record(signature)
    }

    pub fn latest_status_info(
        &self,
        signature: &Signature,
    ) -> Option<StatusInfo> {
        self.lock_observations()
            .get(signature)
            .and_then(|observation| observation.latest_info.clone())
    }

    pub fn zero_confirmation_count(
        &self,
        signature: &Signature,
    ) -> Option<u32> {
        self.lock_observations()
            .get(signature)
            .map(|observation| observation.counter.count())
    }

    pub fn is_timer_armed(&self, signature: &Signature) -> bool {
        self.lock_observations()
            .get(signature)
            .is_some_and(|observation| observation.poller.is_armed())
    }

    fn downgrade(&self) -> WeakWatcher<S> {
        WeakWatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock_observations(
        &self,
    ) -> MutexGuard<'_, HashMap<Signature, Observation>> {
        self.inner
            .observations
            .lock()
            .expect("Mutex of TransactionWatcher.observations is poisoned")
    }
}

/// Returns `false` if the cluster monitor is dropped before the cluster
/// connected.
async fn wait_until_connected(
    mut cluster: watch::Receiver<ClusterState>,
) -> bool {
    cluster.wait_for(ClusterState::is_connected).await.is_ok()
}
