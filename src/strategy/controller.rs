use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::metrics::METRICS;
use crate::schema::{CollectionMetrics, SourceHealth};
use crate::sources::adapter::SourceProfile;

use super::adaptive::{AdaptiveState, RequestOutcome};
use super::params::StrategyParameters;
use super::store::MetricsStore;

/// Default number of `after_request` calls between two snapshots.
pub const DEFAULT_PERSISTENCE_INTERVAL: u64 = 10;

/// Construction errors.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("source_name must not be empty")]
    EmptySourceName,
}

/// ============================================================
/// AdaptiveCollectionStrategy
/// ============================================================
///
/// Client-side rate governor for **one** external source.
///
/// Usage contract:
/// - `before_request().await` exactly once before every attempt
/// - perform the request
/// - `after_request(..)` exactly once with the outcome
///
/// CONCURRENCY:
/// - `after_request` takes `&mut self`: one caller sequence per
///   instance. Fan-out to the same source needs an outer Mutex.
/// - Different sources use independent instances.
/// - Persistence runs on a spawned task with a cloned snapshot and
///   never blocks or fails the caller.
///
pub struct AdaptiveCollectionStrategy {
    source_name: String,
    profile: Arc<dyn SourceProfile>,
    params: StrategyParameters,
    store: Arc<dyn MetricsStore>,
    state: AdaptiveState,
    persistence_interval: u64,
    calls_since_persist: u64,
    pending_persist: Option<JoinHandle<()>>,
}

impl AdaptiveCollectionStrategy {
    /// Builds a strategy and resumes from a stored snapshot if any.
    ///
    /// `params` defaults to the profile's preset. A failing store is
    /// logged and treated as "no snapshot".
    pub async fn new(
        source_name: impl Into<String>,
        profile: Arc<dyn SourceProfile>,
        params: Option<StrategyParameters>,
        store: Arc<dyn MetricsStore>,
    ) -> Result<Self, StrategyError> {
        let source_name = source_name.into();
        if source_name.trim().is_empty() {
            return Err(StrategyError::EmptySourceName);
        }

        let params = params.unwrap_or_else(|| profile.default_params());

        let state = match store.load_strategy_metrics(&source_name).await {
            Ok(Some(metrics)) => {
                info!(
                    "[{}] resumed metrics: requests={} health={} delay={:.2}s",
                    source_name,
                    metrics.request_count,
                    metrics.health_status,
                    metrics.adaptive_delay
                );
                AdaptiveState::restored(metrics, &params)
            }
            Ok(None) => AdaptiveState::fresh(&source_name, &params),
            Err(e) => {
                warn!(
                    "[{}] could not load stored metrics, starting fresh: {:#}",
                    source_name, e
                );
                AdaptiveState::fresh(&source_name, &params)
            }
        };

        Ok(Self {
            source_name,
            profile,
            params,
            store,
            state,
            persistence_interval: DEFAULT_PERSISTENCE_INTERVAL,
            calls_since_persist: 0,
            pending_persist: None,
        })
    }

    /// Sets how many calls pass between snapshots. 0 disables
    /// periodic persistence.
    pub fn with_persistence_interval(mut self, interval: u64) -> Self {
        self.persistence_interval = interval;
        self
    }

    /// Suspends the calling task for the current delay.
    pub async fn before_request(&self) {
        let delay = self.state.current_delay;
        if delay > 0.0 {
            sleep(Duration::from_secs_f64(delay)).await;
        }
    }

    /// Records the outcome of one request attempt.
    ///
    /// Never suspends and never fails: the metrics update is a single
    /// synchronous step and persistence is fire-and-forget.
    pub fn after_request(
        &mut self,
        success: bool,
        response_time: f64,
        status_code: u16,
        headers: Option<&HashMap<String, String>>,
    ) {
        let outcome = RequestOutcome {
            success,
            response_time,
            status_code,
            headers,
        };
        let previous_health = self.state.metrics.health_status;
        let previous_delay = self.state.current_delay;

        self.state = self
            .state
            .apply(&self.params, self.profile.rate_limit_rule(), &outcome, Utc::now());

        let m = &self.state.metrics;
        debug!(
            "[{}] status={} ok={} rt={:.3}s delay={:.2}s->{:.2}s streak={}",
            self.source_name,
            status_code,
            success,
            response_time,
            previous_delay,
            self.state.current_delay,
            self.state.consecutive_failures
        );

        if outcome.is_rate_limited() {
            METRICS.rate_limited.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[{}] rate limited (429 #{}), delay now {:.1}s",
                self.source_name, m.rate_limit_count, self.state.current_delay
            );
        }

        if previous_health != m.health_status && previous_health != SourceHealth::Unknown {
            info!(
                "[{}] health {} -> {} (success rate {:.0}%)",
                self.source_name,
                previous_health,
                m.health_status,
                m.success_rate * 100.0
            );
        }

        self.calls_since_persist += 1;
        if self.persistence_interval > 0 && self.calls_since_persist >= self.persistence_interval {
            self.calls_since_persist = 0;
            self.spawn_persist();
        }
    }

    /// Returns the parameters a collector should apply right now.
    pub fn get_collection_parameters(&self) -> Map<String, Value> {
        let health = self.state.metrics.health_status;
        let mut params = self
            .profile
            .collection_parameters(self.state.current_delay, health);

        params.insert("request_delay".into(), Value::from(self.state.current_delay));
        params.insert("health_status".into(), Value::from(health.as_str()));
        params
    }

    /// Saves a snapshot right away and waits for the result.
    pub async fn persist_now(&self) -> bool {
        persist(self.store.as_ref(), &self.source_name, &self.state.metrics).await
    }

    /// Waits for the last spawned snapshot (if any) to finish.
    ///
    /// Saves run one after another, so this covers every earlier one.
    pub async fn flush(&mut self) {
        if let Some(handle) = self.pending_persist.take() {
            if let Err(e) = handle.await {
                warn!("[{}] metrics persistence task failed: {}", self.source_name, e);
            }
        }
    }

    fn spawn_persist(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[{}] no async runtime, skipping metrics persistence", self.source_name);
            return;
        };

        let store = self.store.clone();
        let source_name = self.source_name.clone();
        let snapshot = self.state.metrics.clone();

        // Chain behind the previous save so the newest snapshot lands last
        let previous = self.pending_persist.take();
        self.pending_persist = Some(runtime.spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!("[{}] metrics persistence task failed: {}", source_name, e);
                }
            }
            persist(store.as_ref(), &source_name, &snapshot).await;
        }));
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn profile(&self) -> &dyn SourceProfile {
        self.profile.as_ref()
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    pub fn metrics(&self) -> &CollectionMetrics {
        &self.state.metrics
    }

    pub fn current_delay(&self) -> f64 {
        self.state.current_delay
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.consecutive_failures
    }
}

/// Best-effort save. Logs and counts, never propagates.
async fn persist(
    store: &dyn MetricsStore,
    source_name: &str,
    metrics: &CollectionMetrics,
) -> bool {
    match store.save_strategy_metrics(source_name, metrics).await {
        Ok(true) => {
            METRICS.persist_ok.fetch_add(1, Ordering::Relaxed);
            debug!("[{}] metrics persisted", source_name);
            true
        }
        Ok(false) => {
            METRICS.persist_errors.fetch_add(1, Ordering::Relaxed);
            debug!("[{}] metrics store declined snapshot", source_name);
            false
        }
        Err(e) => {
            METRICS.persist_errors.fetch_add(1, Ordering::Relaxed);
            warn!("[{}] metrics persistence failed: {:#}", source_name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::get_profile;
    use crate::strategy::store::{InMemoryMetricsStore, NoopMetricsStore};
    use std::sync::atomic::AtomicUsize;

    /// Store that always fails and counts the attempts.
    #[derive(Default)]
    struct FailingStore {
        saves: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MetricsStore for FailingStore {
        async fn save_strategy_metrics(
            &self,
            _: &str,
            _: &CollectionMetrics,
        ) -> anyhow::Result<bool> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("bucket unavailable"))
        }

        async fn load_strategy_metrics(
            &self,
            _: &str,
        ) -> anyhow::Result<Option<CollectionMetrics>> {
            Err(anyhow::anyhow!("bucket unavailable"))
        }
    }

    /// Store whose first save is slow; records the order saves complete in.
    #[derive(Default)]
    struct SlowFirstStore {
        completed: std::sync::Mutex<Vec<u64>>,
        last: std::sync::Mutex<Option<CollectionMetrics>>,
    }

    #[async_trait::async_trait]
    impl MetricsStore for SlowFirstStore {
        async fn save_strategy_metrics(
            &self,
            _: &str,
            metrics: &CollectionMetrics,
        ) -> anyhow::Result<bool> {
            if metrics.request_count == 1 {
                sleep(Duration::from_millis(100)).await;
            }
            self.completed.lock().unwrap().push(metrics.request_count);
            *self.last.lock().unwrap() = Some(metrics.clone());
            Ok(true)
        }

        async fn load_strategy_metrics(
            &self,
            _: &str,
        ) -> anyhow::Result<Option<CollectionMetrics>> {
            Ok(self.last.lock().unwrap().clone())
        }
    }

    async fn strategy(
        kind: &str,
        params: Option<StrategyParameters>,
    ) -> AdaptiveCollectionStrategy {
        AdaptiveCollectionStrategy::new(
            format!("{}-test", kind),
            get_profile(kind).unwrap(),
            params,
            Arc::new(NoopMetricsStore),
        )
        .await
        .unwrap()
    }

    fn retry_after(secs: &str) -> HashMap<String, String> {
        HashMap::from([("Retry-After".to_string(), secs.to_string())])
    }

    #[tokio::test]
    async fn rejects_empty_source_name() {
        let result = AdaptiveCollectionStrategy::new(
            "  ",
            get_profile("web").unwrap(),
            None,
            Arc::new(NoopMetricsStore),
        )
        .await;
        assert!(matches!(result, Err(StrategyError::EmptySourceName)));
    }

    #[tokio::test]
    async fn fresh_strategy_starts_at_base_delay() {
        let s = strategy("reddit", None).await;
        assert_eq!(s.current_delay(), 2.0);
        assert_eq!(s.metrics().request_count, 0);
        assert_eq!(s.metrics().health_status, SourceHealth::Unknown);
        assert_eq!(s.params().max_delay(), 300.0);
    }

    #[tokio::test]
    async fn documented_failure_scenario() {
        let params = StrategyParameters::new(2.0, 0.5, 60.0, 2.0).unwrap();
        let mut s = strategy("web", Some(params)).await;

        s.after_request(false, 1.0, 500, None);
        assert_eq!(s.current_delay(), 2.0);

        s.after_request(false, 1.0, 500, None);
        assert_eq!(s.current_delay(), 4.0);

        s.after_request(true, 0.3, 200, None);
        assert!(s.current_delay() < 4.0);
        assert!(s.current_delay() >= 0.5);
        assert_eq!(s.metrics().adaptive_delay, s.current_delay());
    }

    #[tokio::test]
    async fn successes_relax_monotonically() {
        let mut s = strategy("web", None).await;
        let mut previous = s.current_delay();
        for _ in 0..25 {
            s.after_request(true, 0.25, 200, None);
            assert!(s.current_delay() <= previous);
            assert!(s.current_delay() >= s.params().min_delay());
            previous = s.current_delay();
        }
        assert_eq!(s.metrics().health_status, SourceHealth::Healthy);
    }

    #[tokio::test]
    async fn retry_after_is_honored_for_every_kind() {
        for kind in ["reddit", "rss", "web"] {
            let mut s = strategy(kind, None).await;
            s.after_request(false, 0.1, 429, Some(&retry_after("300")));
            assert!(s.current_delay() >= 300.0, "{} delay {}", kind, s.current_delay());
            assert_eq!(s.metrics().rate_limit_count, 1);
        }
    }

    #[tokio::test]
    async fn collection_parameters_expose_delay_and_health() {
        let mut s = strategy("rss", None).await;
        s.after_request(true, 0.1, 200, None);

        let params = s.get_collection_parameters();
        assert_eq!(params["request_delay"], Value::from(s.current_delay()));
        assert_eq!(params["health_status"], "healthy");
        assert_eq!(params["max_items"], 50);
    }

    #[tokio::test]
    async fn persists_every_interval_and_resumes() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let mut s = AdaptiveCollectionStrategy::new(
            "hn-frontpage",
            get_profile("rss").unwrap(),
            None,
            store.clone(),
        )
        .await
        .unwrap()
        .with_persistence_interval(3);

        s.after_request(true, 0.1, 200, None);
        s.after_request(true, 0.1, 200, None);
        s.flush().await;
        assert!(store.load_strategy_metrics("hn-frontpage").await.unwrap().is_none());

        s.after_request(false, 0.1, 503, None);
        s.flush().await;
        let saved = store.load_strategy_metrics("hn-frontpage").await.unwrap().unwrap();
        assert_eq!(saved.request_count, 3);
        assert_eq!(saved.error_count, 1);

        let resumed = AdaptiveCollectionStrategy::new(
            "hn-frontpage",
            get_profile("rss").unwrap(),
            None,
            store.clone(),
        )
        .await
        .unwrap();
        assert_eq!(resumed.metrics().request_count, 3);
        assert_eq!(resumed.current_delay(), saved.adaptive_delay);
    }

    #[tokio::test]
    async fn failing_store_never_reaches_the_caller() {
        let store = Arc::new(FailingStore::default());
        let mut s = AdaptiveCollectionStrategy::new(
            "flaky",
            get_profile("web").unwrap(),
            None,
            store.clone(),
        )
        .await
        .unwrap()
        .with_persistence_interval(1);

        for _ in 0..4 {
            s.after_request(true, 0.2, 200, None);
            s.flush().await;
        }
        assert_eq!(store.saves.load(Ordering::SeqCst), 4);
        assert_eq!(s.metrics().request_count, 4);
        assert!(!s.persist_now().await);
    }

    #[tokio::test]
    async fn zero_interval_disables_persistence() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let profile = get_profile("web").unwrap();
        let mut s = AdaptiveCollectionStrategy::new("quiet", profile, None, store.clone())
            .await
            .unwrap()
            .with_persistence_interval(0);

        for _ in 0..20 {
            s.after_request(true, 0.2, 200, None);
        }
        s.flush().await;
        assert_eq!(store.len().await, 0);

        assert!(s.persist_now().await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_older_snapshot_never_overwrites_a_newer_one() {
        let store = Arc::new(SlowFirstStore::default());
        let profile = get_profile("web").unwrap();
        let mut s = AdaptiveCollectionStrategy::new("ordered", profile, None, store.clone())
            .await
            .unwrap()
            .with_persistence_interval(1);

        s.after_request(true, 0.2, 200, None);
        s.after_request(false, 0.2, 503, None);
        s.flush().await;

        assert_eq!(*store.completed.lock().unwrap(), vec![1, 2]);
        let stored = store.load_strategy_metrics("ordered").await.unwrap().unwrap();
        assert_eq!(stored.request_count, 2);
        assert_eq!(stored.error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn before_request_sleeps_for_current_delay() {
        let s = strategy("web", None).await;
        let started = tokio::time::Instant::now();
        s.before_request().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "slept {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1600), "slept {:?}", elapsed);
    }
}
