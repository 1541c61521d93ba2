/// Utility helpers shared by the controller and the collectors.
///
/// This module contains:
/// - Case-insensitive header lookup
/// - Rate-limit header parsing (retry-after, x-ratelimit-*)
/// - Small numeric helpers
///
/// IMPORTANT:
/// - No source-specific behavior should live here.
/// - Everything in this module must stay pure and deterministic
///   (callers pass `now` explicitly).
///
use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Wait applied when a 429 carries no usable `retry-after`.
pub const DEFAULT_RETRY_AFTER_SECS: f64 = 60.0;

/// Safety margin added on top of every honored rate-limit wait.
pub const RATE_LIMIT_BUFFER_SECS: f64 = 5.0;

/// Upper bound for any single honored wait (one day).
pub const MAX_RETRY_AFTER_SECS: f64 = 86_400.0;

/// Looks up a header value, ignoring the case of the header name.
///
/// Collectors may hand over maps built from different HTTP clients,
/// so keys are not assumed to be normalized.
pub fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

/// Parses a `retry-after` value into seconds.
///
/// Accepted forms:
/// - delta seconds: "120", "1.5"
/// - HTTP date:     "Wed, 21 Oct 2015 07:28:00 GMT"
///
/// Returns `None` for anything else, including negative deltas.
/// A date in the past yields 0; anything beyond a day is clamped.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<f64> {
    let value = value.trim();

    let secs = match parse_delta_seconds(value) {
        Some(secs) => secs,
        None => {
            let at = DateTime::parse_from_rfc2822(value).ok()?;
            let wait = at.with_timezone(&Utc) - now;
            (wait.num_milliseconds() as f64 / 1000.0).max(0.0)
        }
    };
    Some(secs.min(MAX_RETRY_AFTER_SECS))
}

/// Resolves the `retry-after` header of a 429 response.
///
/// Returns the wait in seconds and whether it came from an explicit,
/// valid header (`true`) or from the fallback default (`false`).
pub fn retry_after_secs(
    headers: Option<&HashMap<String, String>>,
    now: DateTime<Utc>,
) -> (f64, bool) {
    match headers
        .and_then(|h| header(h, "retry-after"))
        .and_then(|v| parse_retry_after(v, now))
    {
        Some(secs) => (secs, true),
        None => (DEFAULT_RETRY_AFTER_SECS, false),
    }
}

/// Parses `x-ratelimit-reset` as delta seconds (Reddit style).
pub fn ratelimit_reset_secs(headers: Option<&HashMap<String, String>>) -> Option<f64> {
    headers
        .and_then(|h| header(h, "x-ratelimit-reset"))
        .and_then(parse_delta_seconds)
        .map(|secs| secs.min(MAX_RETRY_AFTER_SECS))
}

/// Parses `x-ratelimit-limit` as an integer request budget.
///
/// Some APIs send decimals ("600.0"); those are truncated.
pub fn ratelimit_limit(headers: Option<&HashMap<String, String>>) -> Option<u64> {
    headers
        .and_then(|h| header(h, "x-ratelimit-limit"))
        .and_then(parse_delta_seconds)
        .map(|v| v as u64)
}

fn parse_delta_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Clamps non-finite or negative durations to zero.
pub fn sanitize_secs(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}
