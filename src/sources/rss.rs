use serde_json::{Map, Value, json};

use crate::schema::SourceHealth;
use crate::strategy::StrategyParameters;

use super::adapter::{SourceProfile, into_knobs, scaled_budget};

/// RSS / Atom syndication feeds. Aggressive preset.
///
/// Feeds are static documents behind CDNs and rarely rate-limit, so
/// the preset starts fast, relaxes faster (decay 0.9) and never
/// backs off past 30s.
pub struct RssProfile;

const MAX_ITEMS: u64 = 50;

impl SourceProfile for RssProfile {
    fn name(&self) -> &'static str {
        "rss"
    }

    fn default_params(&self) -> StrategyParameters {
        StrategyParameters::new(0.5, 0.1, 30.0, 1.5)
            .and_then(|p| p.with_decay_factor(0.9))
            .unwrap_or_default()
    }

    fn collection_parameters(
        &self,
        _current_delay: f64,
        health: SourceHealth,
    ) -> Map<String, Value> {
        into_knobs(json!({
            "max_items": scaled_budget(MAX_ITEMS, health),
            "follow_redirects": true,
            "timeout": 15,
        }))
    }
}
