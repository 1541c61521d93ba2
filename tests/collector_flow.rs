use std::sync::Arc;
use std::time::Duration;

use adaptive_source_collector::collector::runner::run_source;
use adaptive_source_collector::config::SourceConfig;
use adaptive_source_collector::{
    AdaptiveCollectionStrategy, CollectionMetrics, InMemoryMetricsStore, MetricsStore,
    SourceHealth, StrategyParameters, get_profile,
};
use mockito::Server;
use tokio::sync::watch;

fn source(name: &str, url: String) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        kind: "rss".to_string(),
        url,
        enabled: true,
        poll_interval_secs: 0,
        params: None,
    }
}

/// Polls the store until the worker has written a first snapshot.
async fn wait_for_snapshot(store: &InMemoryMetricsStore, name: &str) -> CollectionMetrics {
    for _ in 0..250 {
        if let Some(m) = store.load_strategy_metrics(name).await.unwrap() {
            return m;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no snapshot written for {}", name);
}

async fn run_until_first_snapshot(name: &str, url: String) -> CollectionMetrics {
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::ring::default_provider(),
    );

    let store = Arc::new(InMemoryMetricsStore::new());
    let params = StrategyParameters::new(0.01, 0.01, 30.0, 1.5).unwrap();
    let strategy = AdaptiveCollectionStrategy::new(
        name,
        get_profile("rss").unwrap(),
        Some(params),
        store.clone(),
    )
    .await
    .unwrap()
    .with_persistence_interval(1);

    let (tx, rx) = watch::channel(false);
    let worker = tokio::spawn(run_source(
        strategy,
        source(name, url),
        reqwest::Client::new(),
        rx,
    ));

    wait_for_snapshot(&store, name).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop on shutdown")
        .unwrap();

    // final snapshot written on shutdown
    store.load_strategy_metrics(name).await.unwrap().unwrap()
}

#[tokio::test]
async fn healthy_feed_is_polled_and_persisted() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body("<rss><channel></channel></rss>")
        .expect_at_least(1)
        .create_async()
        .await;

    let metrics = run_until_first_snapshot("feed", format!("{}/feed.xml", server.url())).await;

    assert!(metrics.request_count >= 1);
    assert_eq!(metrics.error_count, 0);
    assert_eq!(metrics.health_status, SourceHealth::Healthy);
    assert!(metrics.adaptive_delay >= 0.01);
}

#[tokio::test]
async fn rate_limited_feed_backs_off_and_stops_cleanly() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/feed.xml")
        .with_status(429)
        .with_header("retry-after", "300")
        .create_async()
        .await;

    let metrics = run_until_first_snapshot("throttled", format!("{}/feed.xml", server.url())).await;

    // the worker was parked in a 305s delay and still shut down promptly
    assert_eq!(metrics.request_count, 1);
    assert_eq!(metrics.rate_limit_count, 1);
    assert!(metrics.adaptive_delay >= 300.0);
    assert!(metrics.rate_limit_reset.is_some());
}

#[tokio::test]
async fn unreachable_source_counts_transport_errors() {
    // Port 9 (discard) on localhost is closed on test machines
    let metrics = run_until_first_snapshot("offline", "http://127.0.0.1:9/feed".to_string()).await;

    assert!(metrics.error_count >= 1);
    assert_eq!(metrics.success_count, 0);
    assert_eq!(metrics.health_status, SourceHealth::Error);
}
