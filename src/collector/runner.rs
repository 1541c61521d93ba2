use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Instant;

use log::{debug, info, warn};
use rand::random_range;
use reqwest::Client;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

use crate::config::SourceConfig;
use crate::metrics::METRICS;
use crate::strategy::AdaptiveCollectionStrategy;

/// Request timeout used when a profile does not provide one.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Status reported for attempts that never got an HTTP response.
const STATUS_TRANSPORT_ERROR: u16 = 0;

/// Runs the polling loop for exactly one source.
///
/// This loop:
/// - Waits for the strategy's adaptive delay
/// - Fetches the source URL once
/// - Reports the outcome back to the strategy
/// - Pauses for the configured poll interval (with jitter)
///
/// GUARANTEES:
/// - Exits only when `shutdown` flips to `true`
/// - On exit, any in-flight snapshot is awaited and a final one is
///   written, so the next session resumes from here
///
/// NOT RESPONSIBLE FOR:
/// - Content parsing (downstream processing stage)
/// - Deciding which sources exist (configuration)
///
pub async fn run_source(
    mut strategy: AdaptiveCollectionStrategy,
    cfg: SourceConfig,
    client: Client,
    mut shutdown: watch::Receiver<bool>,
) {
    METRICS.sources_active.fetch_add(1, Ordering::Relaxed);
    info!(
        "[{}] collector started ({}, base delay {:.2}s)",
        cfg.name,
        strategy.profile().name(),
        strategy.params().base_delay()
    );

    loop {
        tokio::select! {
            _ = strategy.before_request() => {}
            _ = shutdown.changed() => break,
        }

        poll_once(&mut strategy, &cfg, &client).await;

        let pause = poll_pause(cfg.poll_interval_secs);
        tokio::select! {
            _ = sleep(pause) => {}
            _ = shutdown.changed() => break,
        }
    }

    strategy.flush().await;
    strategy.persist_now().await;
    METRICS.sources_active.fetch_sub(1, Ordering::Relaxed);
    info!(
        "[{}] collector stopped after {} requests ({})",
        cfg.name,
        strategy.metrics().request_count,
        strategy.metrics().health_status
    );
}

/// Performs one fetch and reports its outcome.
///
/// The body is drained so the response time covers the whole
/// transfer, then dropped.
async fn poll_once(
    strategy: &mut AdaptiveCollectionStrategy,
    cfg: &SourceConfig,
    client: &Client,
) {
    let params = strategy.get_collection_parameters();
    let timeout = params
        .get("timeout")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    METRICS.requests_sent.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let result = client
        .get(&cfg.url)
        .timeout(Duration::from_secs(timeout))
        .send()
        .await;

    match result {
        Ok(resp) => {
            let status = resp.status();
            let headers = header_map(resp.headers());
            let body = resp.bytes().await;
            let elapsed = started.elapsed().as_secs_f64();

            let success = status.is_success() && body.is_ok();
            if success {
                METRICS.requests_ok.fetch_add(1, Ordering::Relaxed);
            } else {
                METRICS.requests_failed.fetch_add(1, Ordering::Relaxed);
            }

            match &body {
                Ok(bytes) => debug!(
                    "[{}] {} -> {} bytes in {:.3}s",
                    cfg.name,
                    status,
                    bytes.len(),
                    elapsed
                ),
                Err(e) => warn!("[{}] {} but body failed: {}", cfg.name, status, e),
            }

            strategy.after_request(success, elapsed, status.as_u16(), Some(&headers));
        }

        // Connect / timeout / TLS failures
        Err(e) => {
            METRICS.requests_failed.fetch_add(1, Ordering::Relaxed);
            warn!("[{}] request failed: {}", cfg.name, e);
            strategy.after_request(
                false,
                started.elapsed().as_secs_f64(),
                STATUS_TRANSPORT_ERROR,
                None,
            );
        }
    }
}

/// Flattens response headers into the map shape the strategy expects.
///
/// Non-UTF-8 values are skipped; repeated headers keep the last value.
pub fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Poll interval plus up to 10% random jitter so sources configured
/// with the same interval drift apart.
fn poll_pause(interval_secs: u64) -> Duration {
    let base_ms = interval_secs.saturating_mul(1000);
    let jitter_ms = if base_ms >= 10 {
        random_range(0..=base_ms / 10)
    } else {
        0
    };
    Duration::from_millis(base_ms + jitter_ms)
}
