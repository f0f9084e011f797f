//! Opt-in deduplication of identical in-flight generations.
//!
//! While a generation for a cache key is running, later callers with the
//! same key wait on it instead of starting their own, and every caller gets
//! a clone of the one result. The entry is removed when that generation
//! completes, so a failure is never replayed to a request made afterwards.
//! Each shared generation is also driven by its own tokio task, so it
//! finishes even if every waiting caller disconnects.

use common::cache_key::CacheKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tracing::debug;

struct Entry<T: Clone> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

type EntryMap<T> = Mutex<HashMap<CacheKey, Entry<T>>>;

fn lock<T: Clone>(map: &EntryMap<T>) -> MutexGuard<'_, HashMap<CacheKey, Entry<T>>> {
    // Only inserts and removes happen under the lock, so a poisoned map is still consistent
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct InFlight<T: Clone> {
    entries: Arc<EntryMap<T>>,
    next_id: Arc<AtomicU64>,
}

impl<T: Clone> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a generation currently running
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join the running generation for `key`, or start one with `start`
    pub async fn run<F, Fut>(&self, key: &CacheKey, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let future = {
            let mut entries = lock(&self.entries);
            match entries.get(key) {
                Some(entry) => {
                    debug!(cache_key = %key, "joining in-flight generation");
                    entry.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let work = start();
                    let map = self.entries.clone();
                    let owned_key = key.clone();

                    let future = async move {
                        let output = work.await;
                        let mut entries = lock(&map);
                        if entries.get(&owned_key).is_some_and(|entry| entry.id == id) {
                            entries.remove(&owned_key);
                        }
                        output
                    }
                    .boxed()
                    .shared();

                    entries.insert(
                        key.clone(),
                        Entry {
                            id,
                            future: future.clone(),
                        },
                    );
                    tokio::spawn(future.clone());
                    future
                }
            }
        };

        future.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        cache_key::derive_key,
        thumbnail::{normalize, OutputEncoding, RawThumbnailParams},
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(video: &str) -> CacheKey {
        let params = RawThumbnailParams {
            key: Some(video.to_string()),
            ..Default::default()
        };
        derive_key(&normalize(&params, OutputEncoding::Jpeg).unwrap())
    }

    #[tokio::test]
    async fn test_identical_keys_share_one_run() {
        let in_flight: InFlight<Result<u32, String>> = InFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let callers = (0..5).map(|_| {
            let in_flight = in_flight.clone();
            let runs = runs.clone();
            async move {
                in_flight
                    .run(&key("videos/a.mp4"), move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(7)
                    })
                    .await
            }
        });

        let results = futures::future::join_all(callers).await;
        assert!(results.iter().all(|r| *r == Ok(7)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let in_flight: InFlight<u32> = InFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let key_a = key("videos/a.mp4");
        let key_b = key("videos/b.mp4");

        let a = {
            let runs = runs.clone();
            in_flight.run(&key_a, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                1
            })
        };
        let b = {
            let runs = runs.clone();
            in_flight.run(&key_b, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                2
            })
        };

        assert_eq!(futures::join!(a, b), (1, 2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_not_replayed_after_completion() {
        let in_flight: InFlight<Result<u32, String>> = InFlight::new();
        let k = key("videos/a.mp4");

        let first = in_flight
            .run(&k, || async { Err("decoder failed".to_string()) })
            .await;
        assert!(first.is_err());

        let second = in_flight.run(&k, || async { Ok(3) }).await;
        assert_eq!(second, Ok(3));
    }
}
