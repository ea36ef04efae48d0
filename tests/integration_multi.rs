//! Multi-source aggregation integration tests

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use loadvisor::{
    Bus, EventKind, FetchError, FetcherRef, LoadOptions, LoadStatus, MultiSource, Resource, RetryConfig,
};

fn defaults() -> BTreeMap<String, u32> {
    BTreeMap::from([("tables".to_string(), 0), ("stats".to_string(), 0)])
}

/// Test 1: one key succeeds, one fails: partial data plus an error naming the failed key
#[tokio::test(start_paused = true)]
async fn test_partial_failure() {
    let successes = Arc::new(AtomicU32::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let ok_sink = Arc::clone(&successes);
    let err_sink = Arc::clone(&errors);
    let builder = Resource::builder(config("overview"))
        .on_success(move |_data: &BTreeMap<String, u32>| {
            ok_sink.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |msg: &str| err_sink.lock().expect("lock").push(msg.to_string()));
    let overview = MultiSource::from_builder(builder, defaults());

    let (stats, stats_calls) = flaky(u32::MAX, FetchError::new("quota exceeded"), 0);
    let sources = BTreeMap::from([("tables".to_string(), ready(12u32)), ("stats".to_string(), stats)]);

    assert_eq!(overview.load_all(sources, LoadOptions::default()).await, LoadStatus::Partial);

    let state = overview.snapshot();
    let data = state.data.clone().unwrap_or_default();
    assert_eq!(data.get("tables"), Some(&12));
    assert_eq!(data.get("stats"), Some(&0));
    let error = state.error.clone().unwrap_or_default();
    assert!(error.contains("stats"), "{error}");
    assert_eq!(error, "stats: quota exceeded");
    assert!(!state.loading);

    assert_eq!(successes.load(Ordering::SeqCst), 0);
    assert_eq!(errors.lock().expect("lock").len(), 1);
    assert_eq!(calls(&stats_calls), 1);
}

/// Test 2: each key retries independently
#[tokio::test(start_paused = true)]
async fn test_keys_retry_independently() {
    let successes = Arc::new(AtomicU32::new(0));
    let sink = Arc::clone(&successes);
    let builder = Resource::builder(config("overview")).on_success(move |_data: &BTreeMap<String, u32>| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    let overview = MultiSource::from_builder(builder, defaults());

    let (stats, stats_calls) = flaky(2, FetchError::new("unavailable"), 7);
    let sources = BTreeMap::from([("tables".to_string(), ready(1u32)), ("stats".to_string(), stats)]);

    assert_eq!(overview.load_all(sources, LoadOptions::default()).await, LoadStatus::Succeeded);
    let data = overview.snapshot().data.unwrap_or_default();
    assert_eq!(data.get("stats"), Some(&7));
    assert_eq!(calls(&stats_calls), 3);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(overview.snapshot().error, None);
}

/// Test 3: a newer load_all supersedes the previous one
#[tokio::test(start_paused = true)]
async fn test_newer_load_all_wins() {
    let overview = MultiSource::new(config("overview"), defaults());

    let first = BTreeMap::from([("tables".to_string(), delayed(1u32, Duration::from_millis(200)))]);
    let second = BTreeMap::from([("tables".to_string(), delayed(2u32, Duration::from_millis(10)))]);

    let (a, b) = tokio::join!(overview.load_all(first, LoadOptions::default()), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        overview.load_all(second, LoadOptions::default()).await
    });

    assert_eq!(a, LoadStatus::Discarded);
    assert_eq!(b, LoadStatus::Succeeded);
    assert_eq!(overview.snapshot().data.unwrap_or_default().get("tables"), Some(&2));
}

/// Test 4: per-key failures are published as SourceFailed on a shared bus
#[tokio::test(start_paused = true)]
async fn test_source_failed_events() {
    let bus = Bus::new(64);
    let mut events = bus.subscribe_to("overview");
    let cfg = loadvisor::ResourceConfig {
        retry: RetryConfig {
            max_retries: 0,
            ..fast_retry()
        },
        ..config("overview")
    };
    let overview = MultiSource::from_builder(Resource::builder(cfg).with_bus(bus), defaults());

    let broken: FetcherRef<u32> = flaky(1, FetchError::new("offline"), 0).0;
    let sources = BTreeMap::from([("stats".to_string(), broken)]);
    assert_eq!(overview.load_all(sources, LoadOptions::default()).await, LoadStatus::Failed);

    let failed: Vec<Option<String>> = events
        .drain()
        .into_iter()
        .filter(|ev| ev.kind == EventKind::SourceFailed)
        .map(|ev| ev.key.as_deref().map(str::to_string))
        .collect();
    assert_eq!(failed, vec![Some("stats".to_string())]);
    assert_eq!(overview.snapshot().error.as_deref(), Some("stats: offline"));
}
