//! TTL cache in front of a [`SampleProvider`].
//!
//! Readers of a fresh snapshot take only the shared state lock. When the
//! snapshot is missing or expired, one refresh is spawned and every caller
//! that needs fresh data awaits that same refresh, success or failure.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use gst_contracts::{ProviderError, SampleCollection, SampleProvider};
use tracing::Instrument;

type RefreshResult = Result<Arc<SampleCollection>, CacheError>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

#[derive(Debug, Clone)]
pub enum CacheError {
    Provider(Arc<ProviderError>),
    /// The refresh task ended without producing a result (panic or runtime
    /// shutdown).
    Interrupted(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Provider(err) => write!(f, "failed to refresh samples: {}", err),
            CacheError::Interrupted(reason) => write!(f, "sample refresh interrupted: {}", reason),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Provider(err) => Some(&**err),
            CacheError::Interrupted(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct SampleCache {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn SampleProvider>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    inflight: Mutex<Option<RefreshFuture>>,
}

struct Snapshot {
    samples: Arc<SampleCollection>,
    fetched_at: Instant,
}

impl SampleCache {
    /// A zero `ttl` makes every lookup refresh.
    pub fn new(provider: Arc<dyn SampleProvider>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                ttl,
                snapshot: RwLock::new(None),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Whether any snapshot has been stored, fresh or not. Never fetches.
    pub fn has_snapshot(&self) -> bool {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub async fn get_samples(&self) -> Result<Arc<SampleCollection>, CacheError> {
        if let Some(samples) = self.inner.fresh() {
            crate::metrics::observe_cache_lookup("hit");
            return Ok(samples);
        }

        let (refresh, outcome) = {
            let mut inflight = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // A refresh may have been stored while we waited for the slot.
            if let Some(samples) = self.inner.fresh() {
                crate::metrics::observe_cache_lookup("hit");
                return Ok(samples);
            }

            match inflight.as_ref() {
                Some(refresh) => (refresh.clone(), "joined"),
                None => {
                    let refresh = spawn_refresh(Arc::clone(&self.inner));
                    *inflight = Some(refresh.clone());
                    (refresh, "refresh")
                }
            }
        };

        crate::metrics::observe_cache_lookup(outcome);
        refresh.await
    }
}

impl Inner {
    fn fresh(&self) -> Option<Arc<SampleCollection>> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| Arc::clone(&s.samples))
    }

    fn store(&self, samples: Arc<SampleCollection>) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *snapshot = Some(Snapshot {
            samples,
            fetched_at: Instant::now(),
        });
    }
}

/// Empties the in-flight slot when the refresh task ends, including by panic.
struct ClearInflight(Arc<Inner>);

impl Drop for ClearInflight {
    fn drop(&mut self) {
        let mut inflight = self.0.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        *inflight = None;
    }
}

fn spawn_refresh(inner: Arc<Inner>) -> RefreshFuture {
    let handle = tokio::spawn(refresh(inner).in_current_span());

    async move {
        match handle.await {
            Ok(result) => result,
            Err(err) => Err(CacheError::Interrupted(err.to_string())),
        }
    }
    .boxed()
    .shared()
}

async fn refresh(inner: Arc<Inner>) -> RefreshResult {
    let _clear = ClearInflight(Arc::clone(&inner));
    let started = Instant::now();

    let result = inner.provider.execute().await;
    let elapsed = started.elapsed();
    let latency_ms = elapsed.as_millis() as u64;

    match result {
        Ok(collection) => {
            let samples = Arc::new(collection);
            inner.store(Arc::clone(&samples));
            crate::metrics::observe_provider_fetch("ok", elapsed);
            tracing::info!(records = samples.len(), latency_ms, "cache.refresh");
            Ok(samples)
        }
        Err(err) => {
            crate::metrics::observe_provider_fetch(err.kind(), elapsed);
            tracing::warn!(
                error = %err,
                kind = err.kind(),
                latency_ms,
                "cache.refresh_failed"
            );
            Err(CacheError::Provider(Arc::new(err)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gst_contracts::TrackedSample;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SampleProvider for CountingProvider {
        async fn execute(&self) -> Result<SampleCollection, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::connect(format!("refused on call {call}")));
            }
            Ok(SampleCollection::new(vec![TrackedSample {
                sanger_sample_id: format!("S{call}"),
                faculty_sponsor: "Dr Smith".to_string(),
                ..TrackedSample::default()
            }]))
        }
    }

    fn cache_over(provider: &Arc<CountingProvider>, ttl: Duration) -> SampleCache {
        SampleCache::new(Arc::clone(provider) as Arc<dyn SampleProvider>, ttl)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fresh_snapshot_is_served_without_provider_call() {
        let provider = CountingProvider::new(Duration::ZERO);
        let cache = cache_over(&provider, Duration::from_secs(60));
        assert!(!cache.has_snapshot());

        let first = cache.get_samples().await.expect("first fetch");
        let second = cache.get_samples().await.expect("cached fetch");

        assert_eq!(provider.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.has_snapshot());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn expired_snapshot_triggers_new_fetch() {
        let provider = CountingProvider::new(Duration::ZERO);
        let cache = cache_over(&provider, Duration::from_millis(50));

        let first = cache.get_samples().await.expect("first fetch");
        tokio::time::sleep(Duration::from_millis(80)).await;
        let second = cache.get_samples().await.expect("refetch");

        assert_eq!(provider.calls(), 2);
        assert_eq!(first.samples[0].sanger_sample_id, "S1");
        assert_eq!(second.samples[0].sanger_sample_id, "S2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_ttl_fetches_on_every_call() {
        let provider = CountingProvider::new(Duration::ZERO);
        let cache = cache_over(&provider, Duration::ZERO);

        for _ in 0..3 {
            cache.get_samples().await.expect("fetch");
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let provider = CountingProvider::new(Duration::from_millis(100));
        let cache = cache_over(&provider, Duration::from_secs(60));

        let tasks = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_samples().await })
            })
            .collect::<Vec<_>>();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.expect("task").expect("fetch"));
        }

        assert_eq!(provider.calls(), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failure() {
        let provider = CountingProvider::new(Duration::from_millis(100));
        provider.set_failing(true);
        let cache = cache_over(&provider, Duration::from_secs(60));

        let tasks = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_samples().await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let err = task.await.expect("task").unwrap_err();
            assert_eq!(
                err.to_string(),
                "failed to refresh samples: database connection error: refused on call 1"
            );
        }
        assert_eq!(provider.calls(), 1);
        assert!(!cache.has_snapshot());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_refresh_keeps_snapshot_and_next_call_retries() {
        let provider = CountingProvider::new(Duration::ZERO);
        let cache = cache_over(&provider, Duration::ZERO);

        cache.get_samples().await.expect("initial fetch");

        provider.set_failing(true);
        let err = cache.get_samples().await.unwrap_err();
        assert!(matches!(err, CacheError::Provider(ref e) if e.kind() == "connect"));
        assert!(cache.has_snapshot());

        provider.set_failing(false);
        let recovered = cache.get_samples().await.expect("retry succeeds");
        assert_eq!(recovered.samples[0].sanger_sample_id, "S3");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_wait_does_not_cancel_refresh() {
        let provider = CountingProvider::new(Duration::from_millis(100));
        let cache = cache_over(&provider, Duration::from_secs(60));

        let waited = tokio::time::timeout(Duration::from_millis(10), cache.get_samples()).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.has_snapshot());

        cache.get_samples().await.expect("stored by background refresh");
        assert_eq!(provider.calls(), 1);
    }
}
