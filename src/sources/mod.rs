//! Source profile registry and factory
//!
//! This module provides:
//! - Central registration of all supported source kinds
//! - A factory function to resolve profiles by kind name
//!
//! All source-specific tuning must live in dedicated profile modules.
//! The controller interacts exclusively through the `SourceProfile`
//! trait.

pub mod adapter;
pub mod reddit;
pub mod rss;
pub mod web;

use std::sync::Arc;

use adapter::SourceProfile;

/// Kind names accepted by `get_profile`, in preset order
/// (most conservative first).
pub const SUPPORTED_KINDS: [&str; 3] = ["reddit", "web", "rss"];

/// Returns a source profile by kind name.
///
/// PARAMETERS:
/// - `kind`: `sources[].kind` from configuration (case-insensitive)
///
/// RETURNS:
/// - `Some(Arc<dyn SourceProfile>)` if the kind is supported
/// - `None` otherwise
///
/// THREADING:
/// - Profiles are stateless and wrapped in `Arc`
/// - The same profile may back many strategies
///
pub fn get_profile(kind: &str) -> Option<Arc<dyn SourceProfile>> {
    match kind.to_ascii_lowercase().as_str() {
        "reddit" => Some(Arc::new(reddit::RedditProfile)),
        "rss" => Some(Arc::new(rss::RssProfile)),
        "web" => Some(Arc::new(web::WebProfile)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SourceHealth;
    use crate::strategy::RateLimitRule;

    fn base(kind: &str) -> f64 {
        get_profile(kind).unwrap().default_params().base_delay()
    }

    #[test]
    fn registry_resolves_every_supported_kind() {
        for kind in SUPPORTED_KINDS {
            let profile = get_profile(kind).unwrap();
            assert_eq!(profile.name(), kind);
        }
        assert_eq!(get_profile("RSS").unwrap().name(), "rss");
        assert!(get_profile("gopher").is_none());
    }

    #[test]
    fn presets_are_ordered_by_caution() {
        assert!(base("reddit") >= base("web"));
        assert!(base("web") >= base("rss"));
        assert!(base("reddit") >= base("rss"));

        let ordered: Vec<f64> = SUPPORTED_KINDS.iter().map(|k| base(k)).collect();
        assert!(ordered.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn presets_fall_in_their_bands() {
        let reddit = get_profile("reddit").unwrap().default_params();
        let rss = get_profile("rss").unwrap().default_params();
        let web = get_profile("web").unwrap().default_params();

        assert!(reddit.base_delay() >= 2.0);
        assert!(rss.base_delay() <= 1.0);
        assert!((1.0..=3.0).contains(&web.base_delay()));

        // aggressive preset relaxes faster and caps lower
        assert!(rss.decay_factor() < web.decay_factor());
        assert!(rss.max_delay() < web.max_delay());
        assert!(rss.max_delay() < reddit.max_delay());

        // presets must not silently fall back to the defaults
        assert_eq!(reddit.min_delay(), 1.0);
        assert_eq!(rss.decay_factor(), 0.9);
        assert_eq!(web.max_delay(), 120.0);
    }

    #[test]
    fn only_reddit_is_strict() {
        assert_eq!(get_profile("reddit").unwrap().rate_limit_rule(), RateLimitRule::Strict);
        assert_eq!(get_profile("rss").unwrap().rate_limit_rule(), RateLimitRule::Generic);
        assert_eq!(get_profile("web").unwrap().rate_limit_rule(), RateLimitRule::Generic);
    }

    #[test]
    fn knobs_follow_health() {
        let web = get_profile("web").unwrap();
        let healthy = web.collection_parameters(1.5, SourceHealth::Healthy);
        let failing = web.collection_parameters(1.5, SourceHealth::Error);

        assert_eq!(healthy["max_depth"], 2);
        assert_eq!(failing["max_depth"], 1);
        assert_eq!(healthy["max_pages"], 10);
        assert_eq!(failing["max_pages"], 2);
    }
}
