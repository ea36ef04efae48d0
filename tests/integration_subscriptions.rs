//! Push subscription integration tests
//!
//! Tests the registry lifecycle:
//! - Pushes feeding the resource snapshot
//! - Exactly-once, failure-tolerant cleanup
//! - Pushes silenced by cleanup, load and reset, and the stale report

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use common::*;
use loadvisor::{EventKind, FetchError, LoadOptions, LoadStatus, Pusher, Resource, Unsubscribe};

type Slot<K> = Arc<Mutex<Option<Pusher<K>>>>;

/// Setup that stores the pusher and counts unsubscribe calls.
fn capture<K: 'static>(
    slot: &Slot<K>,
    released: &Arc<AtomicU32>,
) -> impl FnOnce(Pusher<K>) -> Result<Unsubscribe, FetchError> + use<K> {
    let slot = Arc::clone(slot);
    let released = Arc::clone(released);
    move |pusher: Pusher<K>| {
        *slot.lock().expect("lock") = Some(pusher);
        let unsub: Unsubscribe = Box::new(move || {
            released.fetch_add(1, Ordering::SeqCst);
            Ok::<(), FetchError>(())
        });
        Ok(unsub)
    }
}

fn pusher<K>(slot: &Slot<K>) -> Pusher<K> {
    slot.lock().expect("lock").clone().expect("pusher registered")
}

/// Test 1: pushes go through the transform and update the snapshot
#[test]
fn test_transformed_pushes_update_state() {
    let res: Resource<Vec<String>> = Resource::builder(config("feed")).empty_when_len_zero().build();
    let registry = res.subscriptions();
    let slot: Slot<Vec<&'static str>> = Arc::new(Mutex::new(None));
    let released = Arc::new(AtomicU32::new(0));

    let handle = registry.setup_realtime_listener_with(
        capture(&slot, &released),
        |raw: Vec<&'static str>| raw.into_iter().map(str::to_uppercase).collect::<Vec<String>>(),
    );
    assert!(handle.is_active());
    assert!(res.snapshot().loading);

    let push = pusher(&slot);
    push.push(vec![]);
    assert!(res.snapshot().is_empty);
    assert!(!res.snapshot().loading);

    push.push(vec!["a", "b"]);
    let state = res.snapshot();
    assert_eq!(state.data, Some(vec!["A".to_string(), "B".to_string()]));
    assert!(!state.is_empty);
    assert_eq!(state.retry_count, 2);
    assert!(state.last_updated.is_some());
}

/// Test 2: cleanup calls every unsubscribe once, even when some fail or panic
#[test]
fn test_cleanup_is_idempotent_and_tolerant() {
    let res: Resource<u32> = Resource::new(config("teardown"));
    let mut events = res.bus().subscribe();
    let registry = res.subscriptions();
    let released = Arc::new(AtomicU32::new(0));

    let ok_slot: Slot<u32> = Arc::new(Mutex::new(None));
    registry.setup_realtime_listener(capture(&ok_slot, &released));

    let failing = Arc::clone(&released);
    registry.setup_realtime_listener(move |_pusher: Pusher<u32>| {
        let unsub: Unsubscribe = Box::new(move || -> Result<(), FetchError> {
            failing.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::new("already closed"))
        });
        Ok(unsub)
    });

    let panicking = Arc::clone(&released);
    registry.setup_realtime_listener(move |_pusher: Pusher<u32>| {
        let unsub: Unsubscribe = Box::new(move || -> Result<(), FetchError> {
            panicking.fetch_add(1, Ordering::SeqCst);
            panic!("listener gone");
        });
        Ok(unsub)
    });
    assert_eq!(registry.active(), 3);

    assert_eq!(registry.cleanup(), 3);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    assert_eq!(registry.active(), 0);

    assert_eq!(registry.cleanup(), 0);
    assert_eq!(released.load(Ordering::SeqCst), 3);

    let mut failures = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::UnsubscribeFailed {
            failures.push(ev.reason.as_deref().unwrap_or_default().to_string());
        }
    }
    failures.sort();
    assert_eq!(failures, vec!["already closed".to_string(), "listener gone".to_string()]);
}

/// Test 3: pushes after cleanup are ignored
#[test]
fn test_push_after_cleanup_ignored() {
    let res: Resource<u32> = Resource::new(config("late"));
    let registry = res.subscriptions();
    let slot: Slot<u32> = Arc::new(Mutex::new(None));
    let released = Arc::new(AtomicU32::new(0));
    registry.setup_realtime_listener(capture(&slot, &released));

    let push = pusher(&slot);
    push.push(1);
    registry.cleanup();
    push.push(2);

    assert_eq!(res.snapshot().data, Some(1));
}

/// Test 4: a newer load silences a listener set up under an older generation
#[tokio::test]
async fn test_load_supersedes_listener() {
    let res: Resource<u32> = Resource::new(config("superseded"));
    let registry = res.subscriptions();
    let slot: Slot<u32> = Arc::new(Mutex::new(None));
    let released = Arc::new(AtomicU32::new(0));
    registry.setup_realtime_listener(capture(&slot, &released));

    res.load(ready(10), LoadOptions::default()).await;
    pusher(&slot).push(99);
    assert_eq!(res.snapshot().data, Some(10));

    let fresh: Slot<u32> = Arc::new(Mutex::new(None));
    registry.setup_realtime_listener(capture(&fresh, &released));
    pusher(&fresh).push(11);
    assert_eq!(res.snapshot().data, Some(11));
}

/// Test 5: a failing or panicking setup surfaces as an error and yields a no-op handle
#[test]
fn test_setup_failures() {
    let errors = Arc::new(AtomicU32::new(0));
    let sink = Arc::clone(&errors);
    let res: Resource<u32> = Resource::builder(config("broken"))
        .on_error(move |_msg: &str| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let registry = res.subscriptions();

    let handle = registry.setup_realtime_listener(|_pusher: Pusher<u32>| Err(FetchError::new("missing index")));
    assert!(!handle.is_active());
    assert_eq!(res.snapshot().error.as_deref(), Some("missing index"));
    assert!(!res.snapshot().loading);

    let handle = registry.setup_realtime_listener(|_pusher: Pusher<u32>| -> Result<Unsubscribe, FetchError> {
        panic!("setup exploded")
    });
    assert!(!handle.unsubscribe());
    assert_eq!(res.snapshot().error.as_deref(), Some("setup exploded"));

    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert_eq!(registry.cleanup(), 0);
}

/// Test 6: releasing one handle leaves the others active
#[test]
fn test_single_handle_release() {
    let res: Resource<u32> = Resource::new(config("partial"));
    let registry = res.subscriptions();
    let released = Arc::new(AtomicU32::new(0));
    let first: Slot<u32> = Arc::new(Mutex::new(None));
    let second: Slot<u32> = Arc::new(Mutex::new(None));

    let h1 = registry.setup_realtime_listener(capture(&first, &released));
    let h2 = registry.setup_realtime_listener(capture(&second, &released));
    assert_ne!(h1.id(), h2.id());

    assert!(h1.unsubscribe());
    pusher(&first).push(1);
    assert_eq!(res.snapshot().data, None);

    pusher(&second).push(2);
    assert_eq!(res.snapshot().data, Some(2));
    assert!(h2.is_active());

    assert_eq!(registry.cleanup(), 1);
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

/// Test 7: a listener silenced by a load reports it once on the bus and stays registered
#[tokio::test]
async fn test_silenced_listener_reported_once() {
    let res: Resource<u32> = Resource::new(config("ticker"));
    let mut events = res.bus().subscribe_to("ticker");
    let registry = res.subscriptions();
    let slot: Slot<u32> = Arc::new(Mutex::new(None));
    let released = Arc::new(AtomicU32::new(0));
    let handle = registry.setup_realtime_listener(capture(&slot, &released));

    assert_eq!(res.load(ready(1), LoadOptions::default()).await, LoadStatus::Succeeded);
    let push = pusher(&slot);
    push.push(2);
    push.push(3);

    assert_eq!(res.snapshot().data, Some(1));
    assert!(handle.is_active());
    let stale: Vec<Option<String>> = events
        .drain()
        .into_iter()
        .filter(|ev| ev.kind == EventKind::SubscriptionStale)
        .map(|ev| ev.key.as_deref().map(str::to_string))
        .collect();
    assert_eq!(stale, vec![Some(handle.id().to_string())]);

    assert_eq!(registry.cleanup(), 1);
    assert!(!handle.is_active());
}
