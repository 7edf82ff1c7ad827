use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use futures_util::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Fetching,
    Fetched,
    FetchFailed,
}

/// State of a single cache entry.
/// A key that was never fetched has no record at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRecord<T> {
    Fetching,
    Fetched(T),
    /// The loader failed, the error is kept as a string so that it can be
    /// shared with every caller that was waiting for the fetch.
    FetchFailed(String),
}

impl<T> FetchRecord<T> {
    pub fn status(&self) -> FetchStatus {
        match self {
            FetchRecord::Fetching => FetchStatus::Fetching,
            FetchRecord::Fetched(_) => FetchStatus::Fetched,
            FetchRecord::FetchFailed(_) => FetchStatus::FetchFailed,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchRecord::Fetched(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self, FetchRecord::Fetching)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchRecord::FetchFailed(_))
    }
}

/// Outcome of one completed fetch.
/// Every write to the cache gets a new version which lets callers that
/// were coalesced onto the same fetch apply its result only once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion<T> {
    pub version: u64,
    pub result: Result<T, String>,
}

impl<T: Clone> FetchCompletion<T> {
    pub fn record(&self) -> FetchRecord<T> {
        match &self.result {
            Ok(data) => FetchRecord::Fetched(data.clone()),
            Err(err) => FetchRecord::FetchFailed(err.clone()),
        }
    }
}

pub type PendingFetch<T> = Shared<BoxFuture<'static, FetchCompletion<T>>>;

struct CacheEntry<T> {
    record: FetchRecord<T>,
    /// Version of the last completed fetch, `0` if none completed yet
    version: u64,
    in_flight: Option<PendingFetch<T>>,
}

/// Caches fetch results by key and guarantees that at most one fetch per
/// key is in flight. Concurrent callers share the result of the pending
/// fetch.
pub struct FetchCache<K, T> {
    entries: Arc<Mutex<HashMap<K, CacheEntry<T>>>>,
    versions: Arc<AtomicU64>,
}

impl<K, T> Clone for FetchCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            versions: self.versions.clone(),
        }
    }
}

impl<K, T> Default for FetchCache<K, T> {
    fn default() -> Self {
        Self {
            entries: Default::default(),
            versions: Default::default(),
        }
    }
}

impl<K, T> FetchCache<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_record(&self, key: &K) -> Option<FetchRecord<T>> {
        self.lock_entries()
            .get(key)
            .map(|entry| entry.record.clone())
    }

    /// Returns the last completed fetch for the key unless a fetch is
    /// currently in flight.
    pub fn get_completion(&self, key: &K) -> Option<FetchCompletion<T>> {
        let entries = self.lock_entries();
        let entry = entries.get(key)?;
        let result = match &entry.record {
            FetchRecord::Fetching => return None,
            FetchRecord::Fetched(data) => Ok(data.clone()),
            FetchRecord::FetchFailed(err) => Err(err.clone()),
        };
        Some(FetchCompletion {
            version: entry.version,
            result,
        })
    }

    pub fn is_fetching(&self, key: &K) -> bool {
        self.lock_entries()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts fetching the value for the key using the provided loader
    /// unless a fetch for it is already in flight, in which case the loader
    /// is dropped and the pending fetch is returned instead.
    ///
    /// The fetch is driven by a spawned task, thus it completes and its
    /// result is stored even if nobody awaits the returned future.
    /// Needs to be called from within a tokio runtime.
    pub fn fetch<F>(&self, key: K, loader: F) -> PendingFetch<T>
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.lock_entries();
            let entry = match entries.entry(key.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(CacheEntry {
                    record: FetchRecord::Fetching,
                    version: 0,
                    in_flight: None,
                }),
            };
            if let Some(pending) = &entry.in_flight {
                trace!("Joining fetch in flight for {:?}", key);
                return pending.clone();
            }

            let pending = Self::store_when_loaded(
                self.entries.clone(),
                self.versions.clone(),
                key.clone(),
                loader,
            );
            entry.record = FetchRecord::Fetching;
            entry.in_flight = Some(pending.clone());
            pending
        };
        trace!("Started fetch for {:?}", key);
        tokio::spawn(pending.clone());
        pending
    }

    fn store_when_loaded<F>(
        entries: Arc<Mutex<HashMap<K, CacheEntry<T>>>>,
        versions: Arc<AtomicU64>,
        key: K,
        loader: F,
    ) -> PendingFetch<T>
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
    {
        async move {
            let result = loader.await;
            let version = versions.fetch_add(1, Ordering::Relaxed) + 1;
            let completion = FetchCompletion { version, result };

            let mut entries = entries
                .lock()
                .expect("Mutex of FetchCache.entries is poisoned");
            let entry = entries.entry(key).or_insert_with(|| CacheEntry {
                record: FetchRecord::Fetching,
                version: 0,
                in_flight: None,
            });
            entry.record = completion.record();
            entry.version = version;
            entry.in_flight = None;

            completion
        }
        .boxed()
        .shared()
    }

    fn lock_entries(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<T>>> {
        self.entries
            .lock()
            .expect("Mutex of FetchCache.entries is poisoned")
    }
}
