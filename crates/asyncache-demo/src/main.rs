//! asyncache demonstration driver
//!
//! Exercises the cache with a toy resolver that parses decimal keys after a
//! simulated backing-store delay, printing the recency order between
//! phases. Run with `RUST_LOG=info` (the default) or `debug` for more.

use std::num::ParseIntError;
use std::time::Duration;

use anyhow::Result;
use asyncache::{Cache, GetResult};
use clap::Parser;
use tokio::task::LocalSet;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of items)
    #[arg(short, long, default_value_t = 3)]
    capacity: usize,

    /// Simulated backing-store latency in milliseconds
    #[arg(short, long, default_value_t = 10)]
    latency: u64,

    /// Keys to look up in order, replacing the built-in script
    #[arg(trailing_var_arg = true)]
    keys: Vec<String>,
}

type DemoCache = Cache<String, u64, ParseIntError>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("asyncache demo v{}", env!("CARGO_PKG_VERSION"));
    info!("cache capacity: {}", args.capacity);
    info!("resolver latency: {}ms", args.latency);

    // The cache expects a single logical thread of control; LocalSet gives
    // the resolver somewhere to park its deferred replies.
    let local = LocalSet::new();
    local.run_until(run(args)).await
}

async fn run(args: Args) -> Result<()> {
    let latency = Duration::from_millis(args.latency);
    let cache: DemoCache = Cache::new(args.capacity, move |key: &String, reply| {
        let key = key.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(latency).await;
            info!("resolver: looking up '{key}'");
            reply.fulfill(key.parse::<u64>());
        });
    });

    if !args.keys.is_empty() {
        for key in &args.keys {
            fetch(&cache, key).await;
        }
        dump_cache(&cache);
        report_stats(&cache);
        return Ok(());
    }

    // A malformed key: the resolver's error reaches the callback.
    fetch(&cache, "one").await;

    for key in ["1", "2", "3"] {
        fetch(&cache, key).await;
    }
    dump_cache(&cache);

    // A hit promotes the entry to most-recently used.
    fetch(&cache, "1").await;
    dump_cache(&cache);

    // The cache is full: this evicts the least-recently-used entry.
    fetch(&cache, "4").await;
    dump_cache(&cache);

    // Two lookups of one absent key issued back to back share a single
    // resolver invocation.
    let (tx_a, rx_a) = tokio::sync::oneshot::channel();
    let (tx_b, rx_b) = tokio::sync::oneshot::channel();
    cache.get("5".to_string(), move |result| {
        report("first waiter", "5", result);
        let _ = tx_a.send(());
    });
    cache.get("5".to_string(), move |result| {
        report("second waiter", "5", result);
        let _ = tx_b.send(());
    });
    info!("resolutions in flight: {}", cache.pending_len());
    let _ = rx_a.await;
    let _ = rx_b.await;
    dump_cache(&cache);

    report_stats(&cache);

    Ok(())
}

fn report_stats(cache: &DemoCache) {
    let stats = cache.stats();
    info!(
        "hits: {}, misses: {}, inserts: {}, evictions: {}, hit ratio: {:.2}",
        stats.hits,
        stats.misses,
        stats.inserts,
        stats.evictions,
        stats.hit_ratio()
    );
}

/// Issue one `get` and wait for its callback to run.
async fn fetch(cache: &DemoCache, key: &str) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let shown = key.to_string();
    cache.get(key.to_string(), move |result| {
        report("get", &shown, result);
        let _ = tx.send(());
    });
    let _ = rx.await;
}

fn report(who: &str, key: &str, result: GetResult<String, u64, ParseIntError>) {
    match result {
        Ok(cursor) => match cursor.value() {
            Some(value) => info!("{who}: '{key}' -> {}", *value),
            None => warn!("{who}: '{key}' resolved but the entry is already gone"),
        },
        Err(err) => warn!("{who}: '{key}' failed: {err}"),
    }
}

/// Print the cached values from most- to least-recently used.
fn dump_cache(cache: &DemoCache) {
    let mut cursor = cache.front();
    let mut order = Vec::new();
    while !cursor.is_end() {
        if let Some(value) = cursor.value() {
            order.push(value.to_string());
        }
        cursor.advance();
    }
    info!("recency order (newest first): [{}]", order.join(", "));
}
