/// Strategy module
///
/// This module groups everything that decides *how fast* a source
/// may be polled:
/// - `params`:     immutable tuning constants per source type
/// - `adaptive`:   the pure adaptation algorithm and health assessment
/// - `controller`: `AdaptiveCollectionStrategy`, the per-source governor
/// - `store`:      the persistence seam for metrics snapshots
///
/// Design notes:
/// - Source-specific tuning MUST NOT live here (see `sources`)
/// - Network I/O MUST NOT live here; collectors report outcomes
///
pub mod adaptive;
pub mod controller;
pub mod params;
pub mod store;

pub use adaptive::{RateLimitRule, RequestOutcome, assess_health};
pub use controller::{AdaptiveCollectionStrategy, StrategyError};
pub use params::{ParamOverrides, ParamsError, StrategyParameters};
pub use store::{InMemoryMetricsStore, MetricsStore, NoopMetricsStore};
