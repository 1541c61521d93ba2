//! Pure adaptation algorithm.
//!
//! Everything in here is a function of `(state, outcome, now)` and
//! performs no I/O, so the delay behaviour can be tested without a
//! runtime or a store. The controller in `strategy::controller` wraps
//! this with the sleep and the persistence side effect.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::schema::{CollectionMetrics, SourceHealth};
use crate::util;

use super::params::StrategyParameters;

/// Health thresholds on the success rate.
pub const HEALTHY_THRESHOLD: f64 = 0.8;
pub const DEGRADED_THRESHOLD: f64 = 0.5;

/// HTTP status that signals an explicit rate limit.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// How a source reacts to a 429.
///
/// Both rules wait at least `retry-after` (60s when missing or
/// invalid) plus the buffer, uncapped by `max_delay`.
///
/// - `Generic`: only `retry-after` is consulted.
/// - `Strict`: the source's rate-limit window is authoritative, so the
///   larger of `retry-after` and `x-ratelimit-reset` is honored. A
///   reset alone never shortens the 60s fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitRule {
    #[default]
    Generic,
    Strict,
}

/// Outcome of one completed request attempt, as reported by a collector.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome<'a> {
    pub success: bool,
    /// Seconds the attempt took
    pub response_time: f64,
    pub status_code: u16,
    pub headers: Option<&'a HashMap<String, String>>,
}

impl RequestOutcome<'_> {
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == STATUS_TOO_MANY_REQUESTS
    }
}

/// Mutable controller state: the metrics record plus the bits of
/// bookkeeping that are not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveState {
    pub metrics: CollectionMetrics,
    pub current_delay: f64,
    pub consecutive_failures: u32,
}

impl AdaptiveState {
    /// Fresh state for a source without history.
    pub fn fresh(source_name: &str, params: &StrategyParameters) -> Self {
        Self {
            metrics: CollectionMetrics::new(source_name, params.base_delay()),
            current_delay: params.base_delay(),
            consecutive_failures: 0,
        }
    }

    /// State resumed from a persisted snapshot.
    ///
    /// Counters are kept; the delay is pulled back into the configured
    /// band so a stale rate-limit wait from a previous session does not
    /// stall the new one.
    pub fn restored(mut metrics: CollectionMetrics, params: &StrategyParameters) -> Self {
        let delay = if metrics.adaptive_delay.is_finite() {
            metrics
                .adaptive_delay
                .clamp(params.min_delay(), params.max_delay())
        } else {
            params.base_delay()
        };
        metrics.adaptive_delay = delay;

        Self {
            metrics,
            current_delay: delay,
            consecutive_failures: 0,
        }
    }

    /// Applies one request outcome and returns the next state.
    pub fn apply(
        &self,
        params: &StrategyParameters,
        rule: RateLimitRule,
        outcome: &RequestOutcome<'_>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut next = self.clone();
        let m = &mut next.metrics;

        // 1. counters + running mean
        m.request_count += 1;
        if outcome.success {
            m.success_count += 1;
        } else {
            m.error_count += 1;
        }
        let rt = util::sanitize_secs(outcome.response_time);
        m.avg_response_time += (rt - m.avg_response_time) / m.request_count as f64;

        if outcome.is_rate_limited() {
            // 2. explicit rate limit overrides normal adaptation
            m.rate_limit_count += 1;
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);

            let (delay, wait) =
                rate_limited_delay(next.current_delay, rule, outcome.headers, now);
            next.current_delay = delay;
            m.current_rate_limit = util::ratelimit_limit(outcome.headers);
            let wait_ms = (wait * 1000.0) as i64;
            m.rate_limit_reset = Some(now + chrono::Duration::milliseconds(wait_ms));
        } else if !outcome.success {
            // 3. back off only once the grace is used up
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            // A delay raised past max_delay by a 429 is kept, never cut back
            if next.consecutive_failures > params.failure_grace() {
                let backed_off =
                    (next.current_delay * params.backoff_multiplier()).min(params.max_delay());
                next.current_delay = next.current_delay.max(backed_off);
            }
        } else {
            // 4. relax slowly towards the floor
            next.consecutive_failures = 0;
            next.current_delay =
                (next.current_delay * params.decay_factor()).max(params.min_delay());
        }

        // 5. + 6.
        m.success_rate = m.compute_success_rate();
        m.health_status = assess_health(m);
        m.adaptive_delay = next.current_delay;
        m.timestamp = now;

        next
    }
}

/// Classifies a source from its success rate.
///
/// A source without recorded requests is optimistically `Healthy`.
pub fn assess_health(metrics: &CollectionMetrics) -> SourceHealth {
    if metrics.request_count == 0 {
        return SourceHealth::Healthy;
    }

    let rate = metrics.compute_success_rate();
    if rate >= HEALTHY_THRESHOLD {
        SourceHealth::Healthy
    } else if rate >= DEGRADED_THRESHOLD {
        SourceHealth::Degraded
    } else {
        SourceHealth::Error
    }
}

/// Computes the delay after a 429.
///
/// Returns `(new_delay, honored_wait)`; the wait excludes the safety
/// buffer and is used to stamp `rate_limit_reset`.
fn rate_limited_delay(
    current: f64,
    rule: RateLimitRule,
    headers: Option<&HashMap<String, String>>,
    now: DateTime<Utc>,
) -> (f64, f64) {
    let (retry_after, explicit) = util::retry_after_secs(headers, now);

    let wait = match rule {
        RateLimitRule::Generic => retry_after,
        RateLimitRule::Strict => match util::ratelimit_reset_secs(headers) {
            Some(reset) if explicit => retry_after.max(reset),
            Some(reset) => reset.max(util::DEFAULT_RETRY_AFTER_SECS),
            None => retry_after,
        },
    };
    (current.max(wait + util::RATE_LIMIT_BUFFER_SECS), wait)
}
