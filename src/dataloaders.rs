//! DataLoader utilities for batch loading
//!
//! Implements the DataLoader pattern for preventing N+1 query problems.
//! See: https://github.com/graphql/dataloader
//!
//! Every key goes through three states within one loader:
//!
//! - queued: requested, waiting for the batch window to close
//! - in flight: part of a batch whose fetch has been issued
//! - done: resolved or failed; the outcome is reused for the life of the loader
//!
//! A loader lives exactly as long as the request that created it, so a failed
//! key stays failed until the request ends.
//!
//! Batches are fetched on their own task. Dropping the `load` that dispatched a
//! batch does not strand the keys in flight; the fetch still completes and
//! wakes every other waiter.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// How long a loader waits for more keys before dispatching a batch.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1);

/// Batch loader trait for loading multiple items at once
#[async_trait]
pub trait BatchLoader<K, V>: Send + Sync
where
    K: Send + Sync + Clone + Eq + Hash,
    V: Send + Sync + Clone,
{
    /// Error shared by every key of a failed batch.
    type Error: Send + Sync + Clone + 'static;

    /// Load batch of items by keys
    ///
    /// `keys` are distinct. This method should fetch all items for the given
    /// keys in a single database query or API call. Keys absent from the
    /// returned map resolve to `V::default()`.
    async fn load_batch(&self, keys: &[K]) -> Result<HashMap<K, V>, Self::Error>;
}

enum Slot<V, E> {
    Queued,
    InFlight,
    Done(Result<V, E>),
}

struct State<K, V, E> {
    slots: HashMap<K, Slot<V, E>>,
    queue: Vec<K>,
}

impl<K: Clone + Eq + Hash, V, E> State<K, V, E> {
    /// Take every queued key as one batch, including `key` itself.
    fn take_batch(&mut self, key: &K) -> Vec<K> {
        if !matches!(self.slots.get(key), Some(Slot::Queued)) {
            // The slot was cleared while we waited.
            self.queue.push(key.clone());
        }
        let batch = std::mem::take(&mut self.queue);
        for k in &batch {
            self.slots.insert(k.clone(), Slot::InFlight);
        }
        batch
    }
}

/// DataLoader with caching and batching
///
/// Keys requested while the batch window is open are coalesced into one
/// [`BatchLoader::load_batch`] call. Outcomes, including failures, are cached
/// so a key is never fetched twice.
pub struct DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + Default + 'static,
    L: BatchLoader<K, V> + 'static,
{
    loader: Arc<L>,
    state: Arc<Mutex<State<K, V, L::Error>>>,
    completed: Arc<watch::Sender<u64>>,
    delay: Duration,
}

impl<K, V, L> DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + Default + 'static,
    L: BatchLoader<K, V> + 'static,
{
    /// Create new DataLoader with a batch loader
    pub fn new(loader: L) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            loader: Arc::new(loader),
            state: Arc::new(Mutex::new(State {
                slots: HashMap::new(),
                queue: Vec::new(),
            })),
            completed: Arc::new(completed),
            delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Set the batch window. A zero delay yields to the scheduler once instead.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Load a single item by key
    ///
    /// Checks cache first, then joins the open batch.
    pub async fn load(&self, key: K) -> Result<V, L::Error> {
        let mut completed = {
            let mut state = self.state.lock().await;
            if let Some(Slot::Done(outcome)) = state.slots.get(&key) {
                return outcome.clone();
            }
            if !state.slots.contains_key(&key) {
                state.slots.insert(key.clone(), Slot::Queued);
                state.queue.push(key.clone());
            }
            self.completed.subscribe()
        };

        // Let sibling resolvers queue their keys before anything is sent.
        self.wait_for_batch().await;

        loop {
            let batch = {
                let mut state = self.state.lock().await;
                if let Some(Slot::Done(outcome)) = state.slots.get(&key) {
                    return outcome.clone();
                }
                if matches!(state.slots.get(&key), Some(Slot::InFlight)) {
                    None
                } else {
                    Some(state.take_batch(&key))
                }
            };

            match batch {
                Some(keys) => self.dispatch(keys),
                // The sender lives as long as `self`, so this only wakes on a
                // completed batch.
                None => {
                    let _ = completed.changed().await;
                }
            }
        }
    }

    /// Load multiple items by keys
    ///
    /// Output is positional: `result[i]` belongs to `keys[i]`, duplicates
    /// included. All uncached keys share one batch.
    pub async fn load_many(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<V>, L::Error> {
        try_join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Clear the cache
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.slots.clear();
        state.queue.clear();
    }

    /// Prime the cache with a value
    ///
    /// Useful for seeding the cache with data you already have. Keys already
    /// queued or in flight are left alone.
    pub async fn prime(&self, key: K, value: V) {
        let mut state = self.state.lock().await;
        match state.slots.get(&key) {
            Some(Slot::Queued) | Some(Slot::InFlight) => {}
            _ => {
                state.slots.insert(key, Slot::Done(Ok(value)));
            }
        }
    }

    async fn wait_for_batch(&self) {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Fetch `keys` on a separate task and record the outcome for every key.
    fn dispatch(&self, keys: Vec<K>) {
        tracing::trace!(keys = keys.len(), "dispatching batch");
        let loader = self.loader.clone();
        let state = self.state.clone();
        let completed = self.completed.clone();

        tokio::spawn(async move {
            let outcome = loader.load_batch(&keys).await;

            {
                let mut state = state.lock().await;
                match outcome {
                    Ok(mut values) => {
                        for key in keys {
                            let value = values.remove(&key).unwrap_or_default();
                            state.slots.insert(key, Slot::Done(Ok(value)));
                        }
                    }
                    Err(error) => {
                        for key in keys {
                            state.slots.insert(key, Slot::Done(Err(error.clone())));
                        }
                    }
                }
            }

            completed.send_modify(|generation| *generation += 1);
        });
    }
}

impl<K, V, L> Clone for DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + Default + 'static,
    L: BatchLoader<K, V> + 'static,
{
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            state: self.state.clone(),
            completed: self.completed.clone(),
            delay: self.delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestLoader {
        calls: AtomicUsize,
        batches: std::sync::Mutex<Vec<Vec<String>>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl BatchLoader<String, Option<String>> for Arc<TestLoader> {
        type Error = String;

        async fn load_batch(&self, keys: &[String]) -> Result<HashMap<String, Option<String>>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(keys.to_vec());
            if self.fail.load(Ordering::SeqCst) {
                return Err("backend down".to_string());
            }
            Ok(keys
                .iter()
                .filter(|k| !k.starts_with("missing"))
                .map(|k| (k.clone(), Some(format!("value-{}", k))))
                .collect())
        }
    }

    fn loader() -> (Arc<TestLoader>, DataLoader<String, Option<String>, Arc<TestLoader>>) {
        let inner = Arc::new(TestLoader::default());
        (inner.clone(), DataLoader::new(inner))
    }

    #[tokio::test]
    async fn test_dataloader_single_load() {
        let (_, loader) = loader();
        let value = loader.load("key1".to_string()).await;
        assert_eq!(value, Ok(Some("value-key1".to_string())));
    }

    #[tokio::test]
    async fn test_dataloader_caching() {
        let (inner, loader) = loader();

        let value1 = loader.load("key1".to_string()).await;
        let value2 = loader.load("key1".to_string()).await;

        assert_eq!(value1, value2);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dataloader_batch_load_is_positional() {
        let (inner, loader) = loader();

        let keys = vec![
            "key2".to_string(),
            "missing".to_string(),
            "key1".to_string(),
            "key2".to_string(),
        ];
        let results = loader.load_many(keys).await.unwrap();

        assert_eq!(
            results,
            vec![
                Some("value-key2".to_string()),
                None,
                Some("value-key1".to_string()),
                Some("value-key2".to_string()),
            ]
        );
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let batches = inner.batches.lock().unwrap();
        assert_eq!(batches[0], vec!["key2", "missing", "key1"]);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_batch() {
        let (inner, loader) = loader();

        let (a, b, c) = tokio::join!(
            loader.load("a".to_string()),
            loader.load("b".to_string()),
            loader.load("a".to_string()),
        );

        assert_eq!(a, Ok(Some("value-a".to_string())));
        assert_eq!(b, Ok(Some("value-b".to_string())));
        assert_eq!(c, a);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_delay_still_batches_siblings() {
        let inner = Arc::new(TestLoader::default());
        let loader = DataLoader::new(inner.clone()).with_delay(Duration::ZERO);

        let results = loader
            .load_many(["x", "y", "z"].map(String::from))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_cached() {
        let (inner, loader) = loader();
        inner.fail.store(true, Ordering::SeqCst);

        let results = tokio::join!(loader.load("a".to_string()), loader.load("b".to_string()));
        assert_eq!(results.0, Err("backend down".to_string()));
        assert_eq!(results.1, Err("backend down".to_string()));

        // A later load of a failed key does not hit the backend again,
        // even once the backend has recovered.
        inner.fail.store(false, Ordering::SeqCst);
        assert_eq!(loader.load("a".to_string()).await, Err("backend down".to_string()));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_keys_get_a_new_batch() {
        let (inner, loader) = loader();

        loader.load("a".to_string()).await.unwrap();
        let results = loader
            .load_many(["a", "b"].map(String::from))
            .await
            .unwrap();

        assert_eq!(results[1], Some("value-b".to_string()));
        let batches = inner.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec!["b"]);
    }

    #[tokio::test]
    async fn test_dataloader_prime() {
        let (inner, loader) = loader();

        loader
            .prime("key1".to_string(), Some("custom-value".to_string()))
            .await;

        let value = loader.load("key1".to_string()).await;
        assert_eq!(value, Ok(Some("custom-value".to_string())));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dataloader_clear() {
        let (inner, loader) = loader();

        loader.load("key1".to_string()).await.unwrap();
        loader.clear().await;

        let value = loader.load("key1".to_string()).await;
        assert_eq!(value, Ok(Some("value-key1".to_string())));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let (inner, loader) = loader();
        let other = loader.clone();

        loader.load("key1".to_string()).await.unwrap();
        other.load("key1".to_string()).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    /// Fails batches containing "a" quickly and answers everything else slowly.
    struct SlowLoader;

    #[async_trait]
    impl BatchLoader<String, Option<String>> for SlowLoader {
        type Error = String;

        async fn load_batch(&self, keys: &[String]) -> Result<HashMap<String, Option<String>>, String> {
            if keys.iter().any(|k| k == "a") {
                tokio::time::sleep(Duration::from_millis(50)).await;
                return Err("a failed".to_string());
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(keys
                .iter()
                .map(|k| (k.clone(), Some(format!("value-{}", k))))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_dropped_dispatcher_does_not_strand_its_batch() {
        let loader = DataLoader::new(SlowLoader);

        let first = loader.clone();
        let pending_a = tokio::spawn(async move { first.load("a".to_string()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // "a" fails while "b" is still being fetched, so try_join_all drops
        // the future that dispatched "b".
        let results = loader.load_many(["a", "b"].map(String::from)).await;
        assert_eq!(results, Err("a failed".to_string()));
        assert_eq!(pending_a.await.unwrap(), Err("a failed".to_string()));

        let b = tokio::time::timeout(Duration::from_secs(2), loader.load("b".to_string()))
            .await
            .expect("load of b never completed");
        assert_eq!(b, Ok(Some("value-b".to_string())));
    }
}
