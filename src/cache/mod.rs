//! Stale-while-revalidate page cache
//!
//! A rendered page is served from memory until its interval elapses. After
//! that the stale copy keeps being served while a single background task
//! rebuilds it; the fresh value replaces the old one in one swap. Only a key
//! that was never built makes the requester wait, and concurrent requesters
//! for such a key wait on the same build.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex as BuildGate;
use tokio::time::Instant;

use crate::Result;

/// A cached value and its bookkeeping
struct Entry<V> {
    value: Arc<V>,
    built_at: Instant,
    /// A background rebuild is running for this key
    refreshing: bool,
}

/// How a lookup was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Built within the interval
    Fresh,
    /// Past the interval; served while a rebuild runs
    Stale,
    /// Built on this request
    Built,
}

pub struct RevalidatingCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
    /// Keys whose first build is in flight
    gates: Mutex<HashMap<K, Arc<BuildGate<()>>>>,
}

impl<K, V> RevalidatingCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            ttl,
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// Return the cached value for `key`, building or refreshing it with `build`
    ///
    /// Build errors are never cached: a failed first build is returned to the
    /// caller, a failed refresh keeps the stale value.
    pub async fn get_or_build<F, Fut>(self: &Arc<Self>, key: K, build: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.lookup(key, build).await.map(|(value, _)| value)
    }

    /// Like [`get_or_build`](Self::get_or_build), also reporting freshness
    pub async fn lookup<F, Fut>(self: &Arc<Self>, key: K, build: F) -> Result<(Arc<V>, Freshness)>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let spawn_refresh = {
            let mut entries = self.lock();
            match entries.get_mut(&key) {
                Some(entry) if entry.built_at.elapsed() < self.ttl => {
                    return Ok((entry.value.clone(), Freshness::Fresh));
                }
                Some(entry) => {
                    let start = !entry.refreshing;
                    entry.refreshing = true;
                    Some((entry.value.clone(), start))
                }
                None => None,
            }
        };

        if let Some((stale, start)) = spawn_refresh {
            if start {
                self.spawn_refresh(key, build);
            }
            return Ok((stale, Freshness::Stale));
        }

        let gate = self.gate(&key);
        let result = {
            let _building = gate.lock().await;
            let built = self.lock().get(&key).map(|entry| entry.value.clone());
            match built {
                // Another request finished the build while this one waited
                Some(value) => Ok((value, Freshness::Fresh)),
                None => self.build_now(key.clone(), build).await,
            }
        };
        self.release_gate(&key, &gate);
        result
    }

    async fn build_now<F, Fut>(&self, key: K, build: F) -> Result<(Arc<V>, Freshness)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let value = Arc::new(build().await?);
        self.lock().insert(
            key,
            Entry {
                value: value.clone(),
                built_at: Instant::now(),
                refreshing: false,
            },
        );
        Ok((value, Freshness::Built))
    }

    /// Drop a key so the next request rebuilds it in the foreground
    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_refresh<F, Fut>(self: &Arc<Self>, key: K, build: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let cache = Arc::clone(self);
        tracing::info!("Regenerating {} {:?} in background", cache.name, key);

        tokio::spawn(async move {
            match build().await {
                Ok(value) => {
                    cache.lock().insert(
                        key.clone(),
                        Entry {
                            value: Arc::new(value),
                            built_at: Instant::now(),
                            refreshing: false,
                        },
                    );
                    tracing::info!("Regenerated {} {:?}", cache.name, key);
                }
                Err(e) => {
                    tracing::warn!("Regenerating {} {:?} failed: {}", cache.name, key, e);
                    if let Some(entry) = cache.lock().get_mut(&key) {
                        entry.refreshing = false;
                    }
                }
            }
        });
    }

    fn gate(&self, key: &K) -> Arc<BuildGate<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(|p| p.into_inner());
        gates.entry(key.clone()).or_default().clone()
    }

    /// Forget the gate once no other request holds it
    fn release_gate(&self, key: &K, gate: &Arc<BuildGate<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(|p| p.into_inner());
        // One reference in the map, one held by the caller
        if Arc::strong_count(gate) <= 2 {
            gates.remove(key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: Duration = Duration::from_secs(60 * 60 * 24);

    /// A builder that renders "render N" for the N-th call
    fn counting_builder(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::future::Ready<Result<String>> + Send + 'static {
        let calls = calls.clone();
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(format!("render {}", n)))
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_reads_are_identical() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, how) = cache
            .lookup("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!(how, Freshness::Built);

        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        let (second, how) = cache
            .lookup("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!(how, Freshness::Fresh);

        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_read_triggers_single_refresh() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_build("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        tokio::time::advance(DAY + Duration::from_secs(1)).await;

        // Both reads land before the refresh runs and get the stale copy
        let (a, how_a) = cache
            .lookup("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        let (b, how_b) = cache
            .lookup("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!((a.as_str(), how_a), ("render 1", Freshness::Stale));
        assert_eq!((b.as_str(), how_b), ("render 1", Freshness::Stale));

        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let (c, how_c) = cache
            .lookup("hooks".into(), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!((c.as_str(), how_c), ("render 2", Freshness::Fresh));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_stale_value() {
        let cache = RevalidatingCache::<(), String>::new("listing", Duration::from_secs(1800));
        cache
            .get_or_build((), || async { Ok("page".to_string()) })
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(1801)).await;

        let stale = cache
            .get_or_build((), || async { Err(Error::SourceUnavailable("down".into())) })
            .await
            .unwrap();
        assert_eq!(stale.as_str(), "page");
        settle().await;

        // The refresh flag was released, so the next read retries
        let calls = Arc::new(AtomicUsize::new(0));
        let again = cache
            .get_or_build((), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!(again.as_str(), "page");
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_build_error_is_not_cached() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let err = cache
            .get_or_build("missing".into(), || async {
                Err(Error::NotFound("post `missing`".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_lookups_share_one_build() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let calls = Arc::new(AtomicUsize::new(0));
        let slow = |calls: Arc<AtomicUsize>| {
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, Error>(format!("render {}", n))
            }
        };

        let (a, b) = tokio::join!(
            cache.lookup("hooks".into(), slow(calls.clone())),
            cache.lookup("hooks".into(), slow(calls.clone())),
        );
        let (a, how_a) = a.unwrap();
        let (b, how_b) = b.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(how_a, Freshness::Built);
        assert_eq!(how_b, Freshness::Fresh);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.gates.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_retries_after_failed_cold_build() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<String, _>(Error::SourceUnavailable("down".into()))
        };

        let (a, b) = tokio::join!(
            cache.get_or_build("hooks".into(), failing),
            cache.get_or_build("hooks".into(), counting_builder(&calls)),
        );
        assert!(a.is_err());
        assert_eq!(b.unwrap().as_str(), "render 1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = RevalidatingCache::<String, String>::new("post", DAY);
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_build("a".into(), counting_builder(&calls))
            .await
            .unwrap();
        cache.invalidate(&"a".to_string());
        let (value, how) = cache
            .lookup("a".into(), counting_builder(&calls))
            .await
            .unwrap();
        assert_eq!(how, Freshness::Built);
        assert_eq!(value.as_str(), "render 2");
    }
}
