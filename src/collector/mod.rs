/// Collector module
///
/// This module groups the runtime side of collection:
/// - One polling worker per configured source
/// - HTTP fetch and outcome reporting
///
/// The collector layer sits between:
/// - Source strategies (pace, health, collection knobs)
/// - The network
///
/// Design notes:
/// - Pacing decisions MUST NOT live here; the worker only obeys
///   `before_request` and reports through `after_request`
/// - Each worker owns its strategy, so no locking is needed
///
pub mod runner;
