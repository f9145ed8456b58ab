//! LRU cache with single-flight computations per key.
//!
//! Both the entries and the in-flight map sit behind one mutex. A computation
//! runs on its own tokio task, so it finishes (and removes its in-flight
//! entry) even if every caller stops waiting.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use tracing::{debug, error};

use crate::error::SummaryError;
use crate::service::SummaryResult;

/// Cache used by the summary service.
pub type SummaryCache = CoalescingCache<String, SummaryResult>;

type Pending<V> = Shared<BoxFuture<'static, Result<V, SummaryError>>>;

struct State<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    inflight: HashMap<K, Pending<V>>,
}

pub struct CoalescingCache<K: Hash + Eq, V> {
    state: Arc<Mutex<State<K, V>>>,
}

impl<K: Hash + Eq, V> Clone for CoalescingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(State {
                entries: LruCache::new(capacity),
                inflight: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().entries.get(key).cloned()
    }

    /// Insert or overwrite, marking the entry most recently used. Evicts the
    /// least recently used entry when full.
    pub fn set(&self, key: K, value: V) {
        if let Some((evicted, _)) = self.lock().entries.push(key.clone(), value) {
            if evicted != key {
                debug!(key = ?evicted, "cache_entry_evicted");
            }
        }
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.lock().inflight.len()
    }

    /// Run `compute` unless a computation for `key` is already running, in
    /// which case wait for that one instead. `compute` is only called when
    /// this caller starts the work.
    ///
    /// A panicking computation resolves every waiter with
    /// [`SummaryError::Aborted`]; the in-flight entry is removed either way.
    pub async fn run_exclusive<F, Fut>(&self, key: K, compute: F) -> Result<V, SummaryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let pending = {
            let mut state = self.lock();
            match state.inflight.get(&key) {
                Some(pending) => {
                    debug!(key = ?key, "computation_coalesced");
                    pending.clone()
                }
                None => {
                    let pending = self.spawn(key.clone(), compute());
                    state.inflight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Must be called with the lock held so the task cannot remove its
    /// in-flight entry before it is inserted.
    fn spawn<Fut>(&self, key: K, fut: Fut) -> Pending<V>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(fut).catch_unwind().await;
            cache.lock().inflight.remove(&key);
            if outcome.is_err() {
                error!(key = ?key, "computation_panicked");
            }
            outcome
        });

        async move {
            match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(panic)) => Err(SummaryError::Aborted(panic_message(panic.as_ref()))),
                Err(join_error) => Err(SummaryError::Aborted(join_error.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
