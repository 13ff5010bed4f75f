//! Fetch Cache Module
//!
//! Public entry point composing the entry store, eviction policy and
//! expiration policy around a pluggable [`Fetcher`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::cache::{
    CacheOptions, CacheStats, Clock, EntryStore, EvictionPolicy, ExpirationPolicy, FetchEvent,
    FetchObserver, FetchOutcome, Fetcher, Flight, InflightRegistry, SharedResult, SystemClock,
};
use crate::error::{CacheError, FetchError, Result};

// == Fetch Result ==
/// A value returned by the cache and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub value: String,
    pub outcome: FetchOutcome,
    /// The key's call count after this request
    pub call_count: u64,
}

/// Everything mutated by a fetch, guarded by one lock.
#[derive(Debug)]
struct CacheState {
    store: EntryStore,
    expiration: ExpirationPolicy,
    eviction: EvictionPolicy,
    stats: CacheStats,
}

/// How a request ended, with the call count needed for observers.
enum Resolution {
    Done(FetchResult),
    Failed { error: CacheError, call_count: u64 },
}

// == Fetch Cache ==
/// Size-bounded, time-expiring cache in front of a [`Fetcher`].
///
/// A key is served from the cache while its last refresh is at most `ttl`
/// old; otherwise the fetcher runs and its result replaces the cached value.
/// Every request, hit or miss, advances the key's call count. When an
/// insertion pushes the cache over capacity the least recently used entry is
/// evicted along with its call count.
///
/// The lock is never held while the fetcher runs, so slow fetches for one key
/// do not block other keys. With
/// [`suppress_duplicate_fetches`](CacheOptions::suppress_duplicate_fetches)
/// at most one fetch per key is in flight; callers arriving while it runs
/// receive its result, error included, and never wait past their own
/// deadline.
pub struct FetchCache {
    state: Mutex<CacheState>,
    inflight: InflightRegistry,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn FetchObserver>>,
    options: CacheOptions,
}

impl FetchCache {
    // == Constructors ==
    /// Creates a cache reading time from the system clock.
    ///
    /// Fails with [`CacheError::CapacityMisconfigured`] when capacity is 0.
    pub fn new(options: CacheOptions, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Self::with_clock(options, fetcher, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(
        options: CacheOptions,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if options.capacity == 0 {
            return Err(CacheError::CapacityMisconfigured(options.capacity));
        }

        let state = CacheState {
            store: EntryStore::new(),
            expiration: ExpirationPolicy::new(),
            eviction: EvictionPolicy::new(options.capacity, options.eviction_log_len),
            stats: CacheStats::new(),
        };

        Ok(Self {
            state: Mutex::new(state),
            inflight: InflightRegistry::new(),
            fetcher,
            clock,
            observers: Vec::new(),
            options,
        })
    }

    /// Adds an observer notified after every request.
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    // == Fetch ==
    /// Returns the value for `key`, from the cache while fresh, otherwise
    /// from the fetcher.
    pub async fn fetch(&self, key: &str) -> Result<String> {
        self.lookup(key).await.map(|result| result.value)
    }

    // == Lookup ==
    /// Like [`fetch`](Self::fetch), also reporting the outcome and call count.
    pub async fn lookup(&self, key: &str) -> Result<FetchResult> {
        match self.resolve(key).await {
            Resolution::Done(result) => {
                self.notify(key, result.outcome, result.call_count, &result.value);
                Ok(result)
            }
            Resolution::Failed { error, call_count } => {
                self.notify(key, FetchOutcome::Failed, call_count, &error.to_string());
                Err(error)
            }
        }
    }

    async fn resolve(&self, key: &str) -> Resolution {
        let deadline = Instant::now() + self.options.fetch_timeout;

        loop {
            if let Some(hit) = self.try_hit(key).await {
                return Resolution::Done(hit);
            }

            if !self.options.suppress_duplicate_fetches {
                let fetched = self.call_fetcher(key, deadline).await;
                return self.settle(key, fetched).await;
            }

            match self.inflight.join(key) {
                Flight::Leader(leader) => {
                    // A flight that ended between the check above and the join
                    // may already have stored the value.
                    if let Some(hit) = self.try_hit(key).await {
                        return Resolution::Done(hit);
                    }

                    let fetched = self.call_fetcher(key, deadline).await;
                    let resolution = self.settle(key, fetched.clone()).await;
                    leader.complete(fetched);
                    return resolution;
                }
                Flight::Follower(follower) => {
                    let shared = match timeout_at(deadline, follower.wait()).await {
                        Ok(Some(shared)) => shared,
                        // Leader went away without a result: lead or follow the next flight.
                        Ok(None) => continue,
                        Err(_) => Err(FetchError::timeout(key)),
                    };
                    return self.settle_follower(key, shared).await;
                }
            }
        }
    }

    /// Runs the fetcher, turning a missed deadline into a timeout.
    async fn call_fetcher(&self, key: &str, deadline: Instant) -> SharedResult {
        match timeout_at(deadline, self.fetcher.fetch(key, deadline)).await {
            Ok(fetched) => fetched,
            Err(_) => Err(FetchError::timeout(key)),
        }
    }

    /// Serves `key` from the cache if its value is fresh.
    async fn try_hit(&self, key: &str) -> Option<FetchResult> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_ms();

        if !state.expiration.is_fresh(key, self.options.ttl, now) {
            return None;
        }
        let value = state.store.get(key, now)?;
        let call_count = state.expiration.record_access(key, now, false);
        state.stats.record_hit();

        debug!(key, call_count, "Retrieving data from cache");
        Some(FetchResult {
            value,
            outcome: FetchOutcome::Hit,
            call_count,
        })
    }

    /// Records the fetcher's result.
    async fn settle(&self, key: &str, fetched: SharedResult) -> Resolution {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = self.clock.now_ms();

        let value = match fetched {
            Ok(value) => value,
            Err(err) => {
                let call_count = state.expiration.record_access(key, now, false);
                return self.fail(state, key, err, call_count, now);
            }
        };

        let existed = state.store.put(key.to_string(), value.clone(), now);
        let call_count = state.expiration.record_access(key, now, true);
        let outcome = if existed {
            state.stats.record_refresh();
            FetchOutcome::Refresh
        } else {
            state.stats.record_miss();
            FetchOutcome::Miss
        };

        let evicted = match state.eviction.enforce_capacity(&mut state.store) {
            Ok(evicted) => evicted,
            Err(error) => return Resolution::Failed { error, call_count },
        };
        for victim in &evicted {
            state.expiration.remove(victim);
            state.stats.record_eviction();
        }
        state.stats.set_total_entries(state.store.size());

        info!(
            key,
            %outcome,
            call_count,
            evicted = evicted.len(),
            "Retrieving data from upstream"
        );
        Resolution::Done(FetchResult {
            value,
            outcome,
            call_count,
        })
    }

    /// Records the result of a flight this caller joined but did not run.
    async fn settle_follower(&self, key: &str, shared: SharedResult) -> Resolution {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = self.clock.now_ms();
        let call_count = state.expiration.record_access(key, now, false);

        match shared {
            Ok(value) => {
                state.store.touch(key, now);
                state.stats.record_hit();

                debug!(key, call_count, "Retrieving data from concurrent fetch");
                Resolution::Done(FetchResult {
                    value,
                    outcome: FetchOutcome::Hit,
                    call_count,
                })
            }
            Err(err) => self.fail(state, key, err, call_count, now),
        }
    }

    /// Failure bookkeeping, falling back to the stale value when enabled.
    fn fail(
        &self,
        state: &mut CacheState,
        key: &str,
        err: FetchError,
        call_count: u64,
        now: u64,
    ) -> Resolution {
        state.stats.record_failure();

        if self.options.serve_stale_on_error {
            if let Some(value) = state.store.get(key, now) {
                warn!(key, error = %err, "Refresh failed, serving stale value");
                return Resolution::Done(FetchResult {
                    value,
                    outcome: FetchOutcome::Stale,
                    call_count,
                });
            }
        }

        warn!(key, error = %err, "Fetch failed");
        Resolution::Failed {
            error: err.into(),
            call_count,
        }
    }

    fn notify(&self, key: &str, outcome: FetchOutcome, call_count: u64, output: &str) {
        if self.observers.is_empty() {
            return;
        }
        let event = FetchEvent {
            key: key.to_string(),
            outcome,
            call_count,
            output: output.to_string(),
            at: self.clock.now_ms(),
        };
        for observer in &self.observers {
            observer.on_fetch(&event);
        }
    }

    // == Inspection ==
    /// Requests counted for `key` since its record was created, 0 if untracked.
    pub async fn call_count(&self, key: &str) -> u64 {
        self.state.lock().await.expiration.call_count(key)
    }

    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.store.size());
        stats
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.store.size()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.store.is_empty()
    }

    /// Whether `key` has a cached value, fresh or stale.
    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.store.contains(key)
    }

    /// The most recently evicted keys, oldest first.
    pub async fn recently_evicted(&self) -> Vec<String> {
        self.state.lock().await.eviction.recently_evicted()
    }

    /// Cached keys from least to most recently used.
    pub async fn keys_by_recency(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .store
            .keys_by_recency()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{fetcher_fn, CallHistory, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(10);

    /// Fetcher answering `"<key>#<n>"` where n counts its invocations.
    fn counting_fetcher(calls: Arc<AtomicUsize>, delay: Duration) -> Arc<dyn Fetcher> {
        Arc::new(fetcher_fn(move |key: String| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, FetchError>(format!("{}#{}", key, n))
            }
        }))
    }

    fn failing_fetcher(calls: Arc<AtomicUsize>) -> Arc<dyn Fetcher> {
        Arc::new(fetcher_fn(move |key: String| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(FetchError::upstream(key, "503 Service Unavailable"))
            }
        }))
    }

    fn test_cache(capacity: usize) -> (FetchCache, Arc<ManualClock>, Arc<AtomicUsize>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FetchCache::with_clock(
            CacheOptions::new(capacity, TTL),
            counting_fetcher(Arc::clone(&calls), Duration::ZERO),
            clock.clone(),
        )
        .unwrap();
        (cache, clock, calls)
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = FetchCache::new(
            CacheOptions::new(0, TTL),
            counting_fetcher(calls, Duration::ZERO),
        );
        assert!(matches!(result, Err(CacheError::CapacityMisconfigured(0))));
    }

    #[tokio::test]
    async fn test_first_fetch_misses_then_hits() {
        let (cache, _clock, calls) = test_cache(10);

        let first = cache.lookup("a").await.unwrap();
        assert_eq!(first.value, "a#1");
        assert_eq!(first.outcome, FetchOutcome::Miss);
        assert_eq!(first.call_count, 1);

        let second = cache.lookup("a").await.unwrap();
        assert_eq!(second.value, "a#1");
        assert_eq!(second.outcome, FetchOutcome::Hit);
        assert_eq!(second.call_count, 2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let (cache, clock, calls) = test_cache(10);

        cache.fetch("a").await.unwrap();

        clock.advance(TTL);
        assert_eq!(cache.fetch("a").await.unwrap(), "a#1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(1));
        let refreshed = cache.lookup("a").await.unwrap();
        assert_eq!(refreshed.value, "a#2");
        assert_eq!(refreshed.outcome, FetchOutcome::Refresh);
        assert_eq!(refreshed.call_count, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hits_do_not_extend_freshness() {
        let (cache, clock, calls) = test_cache(10);

        cache.fetch("a").await.unwrap();
        clock.advance(Duration::from_secs(6));
        cache.fetch("a").await.unwrap();
        clock.advance(Duration::from_secs(6));
        cache.fetch("a").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_one_evicts_previous_key() {
        let (cache, _clock, calls) = test_cache(1);

        cache.fetch("a").await.unwrap();
        cache.fetch("a").await.unwrap();
        cache.fetch("b").await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert!(!cache.contains("a").await);
        assert_eq!(cache.call_count("a").await, 0);

        let again = cache.lookup("a").await.unwrap();
        assert_eq!(again.outcome, FetchOutcome::Miss);
        assert_eq!(again.call_count, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hit_refreshes_recency() {
        let (cache, _clock, _calls) = test_cache(2);

        cache.fetch("a").await.unwrap();
        cache.fetch("b").await.unwrap();
        cache.fetch("a").await.unwrap();
        cache.fetch("c").await.unwrap();

        assert_eq!(cache.recently_evicted().await, vec!["b".to_string()]);
        assert!(cache.contains("a").await);
        assert!(cache.contains("c").await);
        assert_eq!(cache.keys_by_recency().await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_call_count_matches_requests() {
        let (cache, clock, calls) = test_cache(10);

        for _ in 0..10 {
            cache.fetch("a").await.unwrap();
            clock.advance(Duration::from_secs(4));
        }

        assert_eq!(cache.call_count("a").await, 10);
        // Refreshes at t=0, 12s, 24s, 36s
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failure_on_new_key_leaves_cache_unchanged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FetchCache::with_clock(
            CacheOptions::new(10, TTL),
            failing_fetcher(Arc::clone(&calls)),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let err = cache.fetch("a").await.unwrap_err();

        assert!(matches!(err, CacheError::Fetch(FetchError::Upstream { .. })));
        assert!(cache.is_empty().await);
        assert_eq!(cache.call_count("a").await, 0);
        assert_eq!(cache.stats().await.failures, 1);
    }

    /// Fetcher that succeeds until `fail` is set.
    fn switchable_fetcher(fail: Arc<AtomicUsize>) -> Arc<dyn Fetcher> {
        Arc::new(fetcher_fn(move |key: String| {
            let fail = Arc::clone(&fail);
            async move {
                if fail.load(Ordering::SeqCst) > 0 {
                    Err(FetchError::upstream(key, "down"))
                } else {
                    Ok(format!("{}-ok", key))
                }
            }
        }))
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates_and_keeps_stale_value() {
        let fail = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(0));
        let cache = FetchCache::with_clock(
            CacheOptions::new(10, TTL),
            switchable_fetcher(Arc::clone(&fail)),
            clock.clone(),
        )
        .unwrap();

        cache.fetch("a").await.unwrap();
        clock.advance(TTL + Duration::from_millis(1));
        fail.store(1, Ordering::SeqCst);

        assert!(cache.fetch("a").await.is_err());
        assert!(cache.contains("a").await);
        assert_eq!(cache.call_count("a").await, 2);

        // The failed refresh did not make the value fresh again.
        fail.store(0, Ordering::SeqCst);
        let next = cache.lookup("a").await.unwrap();
        assert_eq!(next.outcome, FetchOutcome::Refresh);
        assert_eq!(next.call_count, 3);
    }

    #[tokio::test]
    async fn test_stale_on_error_serves_cached_value() {
        let fail = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(0));
        let cache = FetchCache::with_clock(
            CacheOptions::new(10, TTL).with_stale_on_error(true),
            switchable_fetcher(Arc::clone(&fail)),
            clock.clone(),
        )
        .unwrap();

        cache.fetch("a").await.unwrap();
        clock.advance(TTL * 2);
        fail.store(1, Ordering::SeqCst);

        let stale = cache.lookup("a").await.unwrap();
        assert_eq!(stale.value, "a-ok");
        assert_eq!(stale.outcome, FetchOutcome::Stale);
        assert_eq!(stale.call_count, 2);

        // Nothing to fall back on for an unknown key.
        assert!(cache.fetch("b").await.is_err());
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FetchCache::new(
            CacheOptions::new(10, TTL).with_fetch_timeout(Duration::from_millis(20)),
            counting_fetcher(calls, Duration::from_secs(5)),
        )
        .unwrap();

        let err = cache.fetch("slow").await.unwrap_err();

        assert!(matches!(err, CacheError::Fetch(FetchError::Timeout { .. })));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL),
                counting_fetcher(Arc::clone(&calls), Duration::from_millis(50)),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.fetch("k").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "k#1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.call_count("k").await, 16);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_without_suppression_fetch_each() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL).with_duplicate_suppression(false),
                counting_fetcher(Arc::clone(&calls), Duration::from_millis(50)),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.fetch("k").await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(cache.call_count("k").await, 8);
        assert_eq!(cache.len().await, 1);
    }

    /// Fetcher whose first `successes` calls answer at once; later calls
    /// fail after `delay`.
    fn failing_after(
        calls: Arc<AtomicUsize>,
        successes: usize,
        delay: Duration,
    ) -> Arc<dyn Fetcher> {
        Arc::new(fetcher_fn(move |key: String| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= successes {
                    return Ok(format!("{}#{}", key, n));
                }
                tokio::time::sleep(delay).await;
                Err(FetchError::upstream(key, "503 Service Unavailable"))
            }
        }))
    }

    async fn fetch_concurrently(
        cache: &Arc<FetchCache>,
        key: &str,
        callers: usize,
    ) -> Vec<(Result<String>, Duration)> {
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let cache = Arc::clone(cache);
                let key = key.to_string();
                tokio::spawn(async move {
                    let started = std::time::Instant::now();
                    let result = cache.fetch(&key).await;
                    (result, started.elapsed())
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL),
                failing_after(Arc::clone(&calls), 0, Duration::from_millis(50)),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap(),
        );

        let results = fetch_concurrently(&cache, "k", 8).await;

        for (result, elapsed) in &results {
            assert!(matches!(
                result,
                Err(CacheError::Fetch(FetchError::Upstream { .. }))
            ));
            assert!(*elapsed < Duration::from_millis(200), "took {:?}", elapsed);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.call_count("k").await, 0);
        assert_eq!(cache.stats().await.failures, 8);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_callers_joining_failed_refresh_are_counted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL),
                failing_after(Arc::clone(&calls), 1, Duration::from_millis(50)),
                clock.clone(),
            )
            .unwrap(),
        );

        cache.fetch("k").await.unwrap();
        clock.advance(TTL + Duration::from_millis(1));

        let results = fetch_concurrently(&cache, "k", 8).await;

        assert!(results.iter().all(|(result, _)| result.is_err()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.call_count("k").await, 9);
        assert!(cache.contains("k").await);
    }

    #[tokio::test]
    async fn test_timed_out_flight_bounds_every_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL).with_fetch_timeout(Duration::from_millis(100)),
                counting_fetcher(Arc::clone(&calls), Duration::from_secs(60)),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap(),
        );

        let results = fetch_concurrently(&cache, "k", 8).await;

        let worst = results.iter().map(|(_, elapsed)| *elapsed).max().unwrap();
        assert!(worst < Duration::from_millis(300), "worst caller took {:?}", worst);
        for (result, _) in &results {
            assert!(matches!(
                result,
                Err(CacheError::Fetch(FetchError::Timeout { .. }))
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_flight_to_follower() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(
            FetchCache::with_clock(
                CacheOptions::new(10, TTL),
                counting_fetcher(Arc::clone(&calls), Duration::from_millis(100)),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap(),
        );

        let leader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(follower.await.unwrap().unwrap(), "k#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_fetch_in_parallel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = FetchCache::new(
            CacheOptions::new(10, TTL),
            counting_fetcher(calls, Duration::from_millis(100)),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(cache.fetch("a"), cache.fetch("b"));
        let elapsed = started.elapsed();

        assert!(a.is_ok() && b.is_ok());
        assert!(elapsed < Duration::from_millis(190), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_observer_sees_every_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let history = Arc::new(CallHistory::default());
        let cache = FetchCache::with_clock(
            CacheOptions::new(10, TTL),
            counting_fetcher(calls, Duration::ZERO),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap()
        .with_observer(history.clone());

        cache.fetch("a").await.unwrap();
        cache.fetch("a").await.unwrap();

        let events = history.events("a");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, FetchOutcome::Miss);
        assert_eq!(events[1].outcome, FetchOutcome::Hit);
        assert_eq!(events[1].call_count, 2);
        assert_eq!(history.outputs("a"), vec!["a#1", "a#1"]);
    }

    #[tokio::test]
    async fn test_observer_sees_failures() {
        let history = Arc::new(CallHistory::default());
        let cache = FetchCache::new(
            CacheOptions::new(10, TTL),
            failing_fetcher(Arc::new(AtomicUsize::new(0))),
        )
        .unwrap()
        .with_observer(history.clone());

        let _ = cache.fetch("a").await;

        let events = history.events("a");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, FetchOutcome::Failed);
        assert!(events[0].output.contains("503"));
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let (cache, clock, _calls) = test_cache(1);

        cache.fetch("a").await.unwrap();
        cache.fetch("a").await.unwrap();
        clock.advance(TTL * 2);
        cache.fetch("a").await.unwrap();
        cache.fetch("b").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
