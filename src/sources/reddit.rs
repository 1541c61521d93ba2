use serde_json::{Map, Value, json};

use crate::schema::SourceHealth;
use crate::strategy::{RateLimitRule, StrategyParameters};

use super::adapter::{SourceProfile, into_knobs, scaled_budget};

/// Reddit (social API) profile. Conservative preset.
///
/// Reddit OAuth API:
/// https://support.reddithelp.com/hc/en-us/articles/16160319875092-Reddit-Data-API-Wiki
///
/// Rate-limit windows are reported through `x-ratelimit-*` headers
/// and are authoritative, hence the strict rule.
pub struct RedditProfile;

const MAX_POSTS: u64 = 100;

impl SourceProfile for RedditProfile {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn default_params(&self) -> StrategyParameters {
        // Fixed literals that satisfy the invariants; covered by tests
        StrategyParameters::new(2.0, 1.0, 300.0, 2.0).unwrap_or_default()
    }

    fn collection_parameters(
        &self,
        current_delay: f64,
        health: SourceHealth,
    ) -> Map<String, Value> {
        into_knobs(json!({
            "max_posts": scaled_budget(MAX_POSTS, health),
            "sort": "hot",
            "time_filter": "day",
            "respect_rate_limit_headers": true,
            "min_request_interval": current_delay.max(1.0),
        }))
    }

    fn rate_limit_rule(&self) -> RateLimitRule {
        RateLimitRule::Strict
    }
}
