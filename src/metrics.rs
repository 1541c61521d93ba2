use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

/// Global runtime counters for the collector process.
///
/// Purpose:
/// - Track active source workers
/// - Track request outcomes across all sources
/// - Track rate-limit hits and persistence results
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update from the controller hot path
/// - Process-wide totals only; per-source state lives in
///   `CollectionMetrics`
#[derive(Default)]
pub struct RuntimeMetrics {
    pub sources_active: AtomicUsize,

    // Outcomes
    pub requests_sent: AtomicUsize,
    pub requests_ok: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub rate_limited: AtomicUsize,

    // Persistence
    pub persist_ok: AtomicUsize,
    pub persist_errors: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary for the periodic reporter.
    pub fn summary(&self) -> String {
        format!(
            "src={} req={} ok={} fail={} rl={} persist_ok={} persist_err={}",
            self.sources_active.load(Ordering::Relaxed),
            self.requests_sent.load(Ordering::Relaxed),
            self.requests_ok.load(Ordering::Relaxed),
            self.requests_failed.load(Ordering::Relaxed),
            self.rate_limited.load(Ordering::Relaxed),
            self.persist_ok.load(Ordering::Relaxed),
            self.persist_errors.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
