//! # Example: dashboard
//!
//! A small dashboard wiring several resources to one bus, with every event
//! rendered through [`LogWriter`].
//!
//! Shows:
//! - a plain load followed by a background `reload`
//! - two racing loads where only the newer one commits
//! - a keyed overview where one source fails (partial data)
//! - a push subscription fed by a ticker task, then cleaned up
//!
//! ## Run
//! ```bash
//! RUST_LOG=loadvisor=debug cargo run --example dashboard --features logging
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use loadvisor::{
    Bus, FetchError, FetchFn, FetcherRef, LoadOptions, LogWriter, MultiSource, Pusher, Resource, ResourceConfig,
    Subscribe, SubscriberSet, Unsubscribe,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn after<T: Clone + Send + Sync + 'static>(name: &'static str, value: T, delay: Duration) -> FetcherRef<T> {
    FetchFn::arc(name, move |ctx: CancellationToken| {
        let value = value.clone();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => Err(FetchError::new("cancelled")),
                _ = tokio::time::sleep(delay) => Ok::<T, FetchError>(value),
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loadvisor=debug")))
        .init();

    // 1. One bus for the whole dashboard, rendered by LogWriter
    let bus = Bus::new(256);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let listener = SubscriberSet::listen(subs, bus.clone());

    // 2. Load, then reload in the background keeping old data visible
    let tables: Resource<Vec<String>> = Resource::builder(ResourceConfig::named("tables"))
        .empty_when_len_zero()
        .with_bus(bus.clone())
        .build();
    let list = after("tables", vec!["users".to_string(), "orders".to_string()], Duration::from_millis(30));
    tables.load(list, LoadOptions::default()).await;
    println!("[tables] {:?}", tables.snapshot().data);
    tables.reload().await;
    println!("[tables] reloaded, phase={:?}", tables.snapshot().phase());

    // 3. Two racing loads: the slow one is discarded
    let detail: Resource<&'static str> = Resource::builder(ResourceConfig::named("detail"))
        .with_bus(bus.clone())
        .build();
    let (first, second) = tokio::join!(
        detail.load(after("detail-a", "users", Duration::from_millis(200)), LoadOptions::default()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            detail
                .load(after("detail-b", "orders", Duration::from_millis(20)), LoadOptions::default())
                .await
        }
    );
    println!("[detail] first={first:?} second={second:?} data={:?}", detail.snapshot().data);

    // 4. Keyed overview with one failing source
    let defaults = BTreeMap::from([("rows".to_string(), 0u64), ("size".to_string(), 0u64)]);
    let overview = MultiSource::from_builder(
        Resource::builder(ResourceConfig::named("overview"))
            .with_bus(bus.clone())
            .on_error(|msg: &str| println!("[overview] error: {msg}")),
        defaults,
    );
    let size: FetcherRef<u64> = FetchFn::arc("size", |_ctx: CancellationToken| async {
        Err::<u64, FetchError>(FetchError::new("permission denied").with_code("permission-denied"))
    });
    let sources = BTreeMap::from([
        ("rows".to_string(), after("rows", 1_204u64, Duration::from_millis(15))),
        ("size".to_string(), size),
    ]);
    let status = overview.load_all(sources, LoadOptions::default()).await;
    println!("[overview] {status:?} {:?}", overview.snapshot().data);

    // 5. Push subscription fed by a ticker task
    let ticks: Resource<u64> = Resource::builder(ResourceConfig::named("ticks"))
        .with_bus(bus.clone())
        .build();
    let registry = ticks.subscriptions();
    let stop = CancellationToken::new();
    let ticker_stop = stop.clone();
    registry.setup_realtime_listener(move |pusher: Pusher<u64>| {
        let task = tokio::spawn(async move {
            let mut n = 0;
            loop {
                tokio::select! {
                    _ = ticker_stop.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(25)) => {
                        n += 1;
                        pusher.push(n);
                    }
                }
            }
        });
        let unsub: Unsubscribe = Box::new(move || {
            stop.cancel();
            task.abort();
            Ok::<(), FetchError>(())
        });
        Ok(unsub)
    });

    let mut rx = ticks.watch();
    rx.wait_for(|s| s.data.is_some_and(|n| n >= 3)).await?;
    println!("[ticks] {:?}", ticks.snapshot().data);
    println!("[ticks] released {} listener(s)", registry.cleanup());

    // 6. Let the listener drain, then stop it
    tokio::time::sleep(Duration::from_millis(50)).await;
    listener.shutdown().await;
    Ok(())
}
