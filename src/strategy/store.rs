use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::schema::CollectionMetrics;

/// Persistence collaborator for strategy metrics.
///
/// The controller only ever calls these two operations. Backends
/// (object storage, databases, ...) live outside this crate and plug
/// in through this trait.
///
/// CONTRACT:
/// - `save_strategy_metrics` returns `Ok(false)` when the backend
///   declined the write without an error.
/// - `load_strategy_metrics` returns `Ok(None)` when nothing was
///   stored for `source_name`.
/// - Errors are never fatal to collection; the controller logs them.
///
/// THREAD SAFETY:
/// - Must be Send + Sync; one store is shared by all strategies.
///
#[async_trait::async_trait]
pub trait MetricsStore: Send + Sync {
    async fn save_strategy_metrics(
        &self,
        source_name: &str,
        metrics: &CollectionMetrics,
    ) -> Result<bool>;

    async fn load_strategy_metrics(&self, source_name: &str) -> Result<Option<CollectionMetrics>>;
}

/// Process-local store keeping serialized records in a map.
///
/// Records go through `to_dict` / `from_dict` so the persisted format
/// is exercised exactly as a real backend would see it.
#[derive(Default)]
pub struct InMemoryMetricsStore {
    records: RwLock<HashMap<String, serde_json::Map<String, serde_json::Value>>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sources with a stored snapshot.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait::async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn save_strategy_metrics(
        &self,
        source_name: &str,
        metrics: &CollectionMetrics,
    ) -> Result<bool> {
        self.records
            .write()
            .await
            .insert(source_name.to_string(), metrics.to_dict());
        Ok(true)
    }

    async fn load_strategy_metrics(&self, source_name: &str) -> Result<Option<CollectionMetrics>> {
        let records = self.records.read().await;
        match records.get(source_name) {
            Some(dict) => Ok(Some(CollectionMetrics::from_dict(dict)?)),
            None => Ok(None),
        }
    }
}

/// Store that keeps nothing. Strategies run purely in memory.
pub struct NoopMetricsStore;

#[async_trait::async_trait]
impl MetricsStore for NoopMetricsStore {
    async fn save_strategy_metrics(&self, _: &str, _: &CollectionMetrics) -> Result<bool> {
        Ok(false)
    }

    async fn load_strategy_metrics(&self, _: &str) -> Result<Option<CollectionMetrics>> {
        Ok(None)
    }
}
