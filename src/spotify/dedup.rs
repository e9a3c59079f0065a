//! Coalescing of concurrent identical requests.
//!
//! The first caller for a key spawns the work and publishes a shared handle
//! to it; later callers for the same key await that handle instead of
//! starting their own. The spawned task removes its own entry the moment the
//! work settles, so a fresh call after settlement always starts over.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::error::ApiError;

/// Future every waiter on one key awaits.
pub(crate) type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

struct Entry<V> {
    // Distinguishes this entry from a later one under the same key after a clear.
    id: u64,
    outcome: SharedOutcome<V>,
}

type Table<V> = Arc<Mutex<HashMap<String, Entry<V>>>>;

/// Sole owner of the in-flight request table.
pub(crate) struct RequestTable<V> {
    next_id: AtomicU64,
    in_flight: Table<V>,
}

fn lock<V>(table: &Mutex<HashMap<String, Entry<V>>>) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
    // Nothing panics while holding the lock, but never let poisoning wedge the table.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> RequestTable<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight request for `key`, or start one with `thunk`.
    ///
    /// The work runs on its own task, so it reaches a terminal outcome even if
    /// every caller stops waiting.
    pub(crate) fn execute<F, Fut>(&self, key: String, thunk: F) -> SharedOutcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut map = lock(&self.in_flight);
        if let Some(entry) = map.get(&key) {
            tracing::debug!(key = %key, "joining in-flight request");
            return entry.outcome.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = Arc::clone(&self.in_flight);
        let task_key = key.clone();
        let work = thunk();
        let handle = tokio::spawn(async move {
            let result = work.await;
            let mut map = lock(&table);
            if map.get(&task_key).is_some_and(|e| e.id == id) {
                map.remove(&task_key);
            }
            result
        });

        let outcome = async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::Protocol(format!("request task aborted: {}", e)))
            })
        }
        .boxed()
        .shared();

        map.insert(
            key,
            Entry {
                id,
                outcome: outcome.clone(),
            },
        );
        outcome
    }

    /// Forget every in-flight entry. Running work still completes for its waiters.
    pub(crate) fn clear(&self) {
        lock(&self.in_flight).clear();
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.in_flight).len()
    }
}
