use std::sync::Arc;
use std::time::Duration;

use tracing_call_log::layer::BridgeLayer;
use tracing_call_log::memory::MemorySink;
use tracing_call_log::record::Level;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

async fn drain_into(sink: &MemorySink, expected: usize) {
    for _ in 0..500 {
        if sink.records().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("bridge did not deliver {} records in time", expected);
}

#[tokio::test]
async fn tracing_events_are_redirected_into_the_sink() {
    let sink = MemorySink::new();
    let (layer, _drain) = BridgeLayer::new(
        Arc::new(sink.clone()),
        64,
        tokio::runtime::Handle::current(),
    );

    let subscriber = Registry::default()
        .with(layer.with_filter(Targets::new().with_default(LevelFilter::INFO)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(user = "bob", referer = "https://example.com", "boom happened");
        tracing::debug!("below the threshold");
    });

    drain_into(&sink, 1).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.logger, "bridge");
    assert_eq!(record.message(), Some("boom happened"));
    assert_eq!(record.fields.get("user"), Some(&serde_json::json!("bob")));
    // Normalization applies to bridged records too.
    assert_eq!(
        record.fields.keys().last().map(String::as_str),
        Some("referer")
    );
}

#[tokio::test]
async fn noisy_targets_can_be_capped() {
    let sink = MemorySink::new();
    let (layer, _drain) = BridgeLayer::new(
        Arc::new(sink.clone()),
        64,
        tokio::runtime::Handle::current(),
    );

    let subscriber = Registry::default().with(
        layer.with_filter(
            Targets::new()
                .with_default(LevelFilter::DEBUG)
                .with_target("noisy", LevelFilter::WARN)
                .with_target("access_log", LevelFilter::OFF),
        ),
    );

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "noisy", "suppressed");
        tracing::warn!(target: "noisy", "kept");
        tracing::error!(target: "access_log", "silenced entirely");
        tracing::info!(target: "app", "kept too");
    });

    drain_into(&sink, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let loggers: Vec<(String, Level)> = sink
        .records()
        .into_iter()
        .map(|r| (r.logger, r.level))
        .collect();
    assert_eq!(loggers.len(), 2);
    assert!(loggers.contains(&("noisy".to_string(), Level::Warning)));
    assert!(loggers.contains(&("app".to_string(), Level::Info)));
}

#[tokio::test]
async fn event_levels_map_onto_record_levels() {
    let sink = MemorySink::new();
    let (layer, _drain) = BridgeLayer::new(
        Arc::new(sink.clone()),
        64,
        tokio::runtime::Handle::current(),
    );

    let subscriber = Registry::default()
        .with(layer.with_filter(Targets::new().with_default(LevelFilter::TRACE)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!("w");
        tracing::info!("i");
        tracing::debug!("d");
    });

    drain_into(&sink, 3).await;
    let levels: Vec<Level> = sink.records().into_iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![Level::Warning, Level::Info, Level::Debug]);
}
