use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse health classification of a polled source.
///
/// Serialized as a lowercase string ("healthy", "degraded", ...) so the
/// persisted record stays readable and stable across versions.
///
/// IMPORTANT:
/// - This enum is closed on purpose; adding a variant must be handled
///   in `strategy::adaptive::assess_health` and in every profile.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceHealth {
    /// Success rate at or above 80%
    Healthy,

    /// Success rate between 50% and 80%
    Degraded,

    /// Success rate below 50%
    Error,

    /// No assessment has happened yet
    Unknown,
}

impl SourceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceHealth::Healthy => "healthy",
            SourceHealth::Degraded => "degraded",
            SourceHealth::Error => "error",
            SourceHealth::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SourceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when a persisted metrics record cannot be restored.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics record is not a valid snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("metrics record has an empty source_name")]
    MissingSource,
}

// ------------------------------------------------------------
// Collection metrics
// ------------------------------------------------------------
//
// Per-session counters and derived state for one source.
//
// Owned exclusively by one `AdaptiveCollectionStrategy`. The
// controller is the only writer; everything else receives clones.
//
// Persisted as a flat JSON object (see `to_dict` / `from_dict`).
// Field names are part of the persisted format and must not be
// renamed without a migration.
//
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetrics {
    /// Source identity (e.g. "reddit-rust", "hn-rss")
    pub source_name: String,

    /// Last update time (ISO-8601 when serialized)
    pub timestamp: DateTime<Utc>,

    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub rate_limit_count: u64,

    /// Running mean of reported response times, in seconds
    pub avg_response_time: f64,

    /// `x-ratelimit-limit` reported by the most recent 429, if any
    pub current_rate_limit: Option<u64>,

    /// Instant the most recent rate-limit window is expected to end
    pub rate_limit_reset: Option<DateTime<Utc>>,

    pub health_status: SourceHealth,

    /// Currently active delay in seconds (mirrors the controller)
    pub adaptive_delay: f64,

    /// success_count / request_count, 0 when nothing was recorded
    pub success_rate: f64,
}

impl CollectionMetrics {
    /// Creates a zeroed record for a fresh session.
    pub fn new(source_name: impl Into<String>, adaptive_delay: f64) -> Self {
        Self {
            source_name: source_name.into(),
            timestamp: Utc::now(),
            request_count: 0,
            success_count: 0,
            error_count: 0,
            rate_limit_count: 0,
            avg_response_time: 0.0,
            current_rate_limit: None,
            rate_limit_reset: None,
            health_status: SourceHealth::Unknown,
            adaptive_delay,
            success_rate: 0.0,
        }
    }

    /// Recomputes `success_rate` from the counters.
    pub fn compute_success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }

    /// Serializes the record into a flat JSON object.
    pub fn to_dict(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct with derived Serialize always yields an object
            _ => Map::new(),
        }
    }

    /// Restores a record previously produced by `to_dict`.
    pub fn from_dict(dict: &Map<String, Value>) -> Result<Self, MetricsError> {
        let metrics: Self = serde_json::from_value(Value::Object(dict.clone()))?;
        if metrics.source_name.is_empty() {
            return Err(MetricsError::MissingSource);
        }
        Ok(metrics)
    }
}
