// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Persisted metrics record and health classification
// - util:      Header parsing and small numeric helpers
// - strategy:  Adaptive per-source rate governor and metrics store seam
// - sources:   Source profiles (presets) and profile registry
// - collector: Per-source polling workers
// - metrics:   Process-wide runtime counters
//
pub mod collector;
pub mod config;
pub mod metrics;
pub mod schema;
pub mod sources;
pub mod strategy;
pub mod util;

pub use schema::{CollectionMetrics, SourceHealth};
pub use sources::{adapter::SourceProfile, get_profile};
pub use strategy::{
    AdaptiveCollectionStrategy, InMemoryMetricsStore, MetricsStore, NoopMetricsStore,
    StrategyParameters,
};
