use serde_json::{Map, Value, json};

use crate::schema::SourceHealth;
use crate::strategy::StrategyParameters;

use super::adapter::{SourceProfile, into_knobs, scaled_budget};

/// Generic web page fetches. Balanced preset.
pub struct WebProfile;

const MAX_PAGES: u64 = 10;

impl SourceProfile for WebProfile {
    fn name(&self) -> &'static str {
        "web"
    }

    fn default_params(&self) -> StrategyParameters {
        StrategyParameters::new(1.5, 0.5, 120.0, 2.0).unwrap_or_default()
    }

    fn collection_parameters(
        &self,
        _current_delay: f64,
        health: SourceHealth,
    ) -> Map<String, Value> {
        // Crawl depth only opens up while the site is healthy
        let max_depth = match health {
            SourceHealth::Healthy | SourceHealth::Unknown => 2,
            SourceHealth::Degraded | SourceHealth::Error => 1,
        };

        into_knobs(json!({
            "max_depth": max_depth,
            "max_pages": scaled_budget(MAX_PAGES, health),
            "timeout": 30,
            "respect_robots_txt": true,
        }))
    }
}
