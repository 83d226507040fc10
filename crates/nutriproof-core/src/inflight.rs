//! Collapses concurrent lookups for the same key into one piece of work.
//!
//! The first caller for a key spawns the work and records a shared handle;
//! callers arriving while it runs await that same handle and receive the
//! same `Arc`. The entry is removed when the work settles, success or not,
//! so the next call after completion starts fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InFlightError {
    #[error("{0}")]
    Failed(String),
    #[error("in-flight work aborted: {0}")]
    Aborted(String),
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<Arc<T>, InFlightError>>>;

struct Entry<T> {
    id: u64,
    outcome: SharedOutcome<T>,
}

type EntryMap<T> = Arc<Mutex<HashMap<String, Entry<T>>>>;

pub struct InFlight<T> {
    entries: EntryMap<T>,
    next_id: AtomicU64,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

/// Trimmed and lower-cased, so "Aspartame" and " aspartame" share work.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl<T> InFlight<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` unless work for `key` is already in flight, in which case
    /// this call joins it. `work` is only invoked by the first caller.
    ///
    /// The work runs on its own task: dropping every caller does not cancel it.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<Arc<T>, InFlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = normalize_key(key);
        let outcome = {
            let mut entries = lock(&self.entries);
            match entries.get(&key) {
                Some(entry) => {
                    tracing::debug!(key = %key, "joining in-flight work");
                    entry.outcome.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let outcome = self.spawn(key.clone(), id, work());
                    // Inserted before the lock is released, so the task's
                    // cleanup cannot run ahead of the insert.
                    entries.insert(
                        key,
                        Entry {
                            id,
                            outcome: outcome.clone(),
                        },
                    );
                    outcome
                }
            }
        };
        outcome.await
    }

    /// Number of keys with work currently in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.entries).len()
    }

    fn spawn<Fut>(&self, key: String, id: u64, work: Fut) -> SharedOutcome<T>
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        // Guard lives in the task body: a task rejected by a closing runtime
        // is dropped inside `spawn` while `run` still holds the map lock.
        let entries = Arc::clone(&self.entries);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let _cleanup = RemoveOnDrop {
                entries,
                key: task_key,
                id,
            };
            work.await
                .map(Arc::new)
                .map_err(|e| InFlightError::Failed(format!("{e:#}")))
        });

        let entries = Arc::clone(&self.entries);
        async move {
            match task.await {
                Ok(result) => result,
                Err(join) => {
                    // Never-polled tasks leave their entry behind.
                    remove_entry(&entries, &key, id);
                    Err(InFlightError::Aborted(join.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Removes the map entry when the owning task finishes, panics or is
/// cancelled. Only the entry created alongside it is removed.
struct RemoveOnDrop<T> {
    entries: EntryMap<T>,
    key: String,
    id: u64,
}

impl<T> Drop for RemoveOnDrop<T> {
    fn drop(&mut self) {
        remove_entry(&self.entries, &self.key, self.id);
    }
}

fn remove_entry<T>(entries: &Mutex<HashMap<String, Entry<T>>>, key: &str, id: u64) {
    let mut entries = lock(entries);
    if entries.get(key).is_some_and(|e| e.id == id) {
        entries.remove(key);
    }
}

fn lock<T>(
    entries: &Mutex<HashMap<String, Entry<T>>>,
) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
