use serde_json::{Map, Value};

use crate::schema::SourceHealth;
use crate::strategy::{RateLimitRule, StrategyParameters};

/// SourceProfile is the abstraction layer between:
/// - The generic adaptive controller
/// - Source-type specific tuning (presets, collection knobs)
///
/// Each source kind must:
/// - Provide its default `StrategyParameters` preset
/// - Describe the knobs a collector should apply
/// - Declare how it reacts to explicit rate limits
///
/// DESIGN GOALS:
/// - No source-specific branches inside the controller
/// - One profile per source kind
/// - Profiles carry no mutable state
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Profile instances are shared across strategies and tasks
///
pub trait SourceProfile: Send + Sync {
    /// Canonical kind name.
    ///
    /// CONTRACT:
    /// - Must match `sources[].kind` in configuration
    /// - Lowercase and stable
    ///
    fn name(&self) -> &'static str;

    /// Preset used when the caller does not supply parameters.
    fn default_params(&self) -> StrategyParameters;

    /// Source-specific knobs merged into the collection parameters.
    ///
    /// `request_delay` and `health_status` are added by the controller;
    /// profiles only contribute their own keys. The health is passed so
    /// a profile can shrink its batch size while a source struggles.
    ///
    /// MUST NOT:
    /// - Perform I/O
    ///
    fn collection_parameters(&self, current_delay: f64, health: SourceHealth) -> Map<String, Value>;

    /// Rate-limit handling for this kind. Defaults to `Generic`.
    fn rate_limit_rule(&self) -> RateLimitRule {
        RateLimitRule::Generic
    }
}

/// Scales a per-request item budget down while a source is unhealthy.
///
/// Healthy and not-yet-assessed sources keep the full budget, degraded
/// ones get half and erroring ones a quarter (never less than 1).
pub fn scaled_budget(full: u64, health: SourceHealth) -> u64 {
    let scaled = match health {
        SourceHealth::Healthy | SourceHealth::Unknown => full,
        SourceHealth::Degraded => full / 2,
        SourceHealth::Error => full / 4,
    };
    scaled.max(1)
}

/// Unwraps a `json!({...})` literal into its object map.
pub fn into_knobs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
