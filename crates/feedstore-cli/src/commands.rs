//! Subcommand implementations.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tracing::info;

use feedstore_core::{
    CachedFeed, Clock, FeedCacheStore, FeedImageRecord, FeedStoreBuilder, ImageId,
    InMemoryBackend,
};
use feedstore_fs::JsonFileBackend;

/// Build a store over the JSON file at `path`, or in memory when `None`.
pub fn open_store(path: Option<&Path>, label: &str) -> anyhow::Result<FeedCacheStore> {
    let builder = FeedStoreBuilder::new().label(label);
    let builder = match path {
        Some(path) => {
            let backend = JsonFileBackend::open(path)
                .with_context(|| format!("cannot use {} as a cache file", path.display()))?;
            builder.backend(backend)
        }
        None => {
            info!("no store path configured; using an in-memory cache");
            builder.backend(InMemoryBackend::new())
        }
    };
    Ok(builder.build()?)
}

pub async fn retrieve(store: &FeedCacheStore) -> anyhow::Result<Value> {
    let cached = store.retrieve().await?;
    Ok(serde_json::to_value(cached)?)
}

pub async fn insert(
    store: &FeedCacheStore,
    feed_file: &Path,
    timestamp: Option<DateTime<Utc>>,
    clock: &dyn Clock,
) -> anyhow::Result<Value> {
    let text = tokio::fs::read_to_string(feed_file)
        .await
        .with_context(|| format!("failed to read feed file {}", feed_file.display()))?;
    let feed: Vec<FeedImageRecord> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of feed images", feed_file.display()))?;
    let timestamp = timestamp.unwrap_or_else(|| clock.now());
    let items = feed.len();

    store.insert(feed, timestamp).await?;
    Ok(json!({ "status": "inserted", "items": items, "timestamp": timestamp }))
}

pub async fn delete(store: &FeedCacheStore) -> anyhow::Result<Value> {
    store.delete_cached_feed().await?;
    Ok(json!({ "status": "deleted" }))
}

/// Insert one image at T=100, then two at T=200, retrieving after each.
pub async fn demo(store: &FeedCacheStore) -> anyhow::Result<Value> {
    let mut steps = Vec::new();

    let first = vec![FeedImageRecord::new(ImageId::from_u128(1), "https://a")];
    store.insert(first, unix(100)?).await?;
    steps.push(json!({ "step": "insert", "items": 1, "timestamp": unix(100)? }));
    steps.push(json!({ "step": "retrieve", "result": store.retrieve().await? }));

    let second = vec![
        FeedImageRecord::new(ImageId::from_u128(2), "https://b"),
        FeedImageRecord::new(ImageId::from_u128(3), "https://c"),
    ];
    store.insert(second, unix(200)?).await?;
    steps.push(json!({ "step": "insert", "items": 2, "timestamp": unix(200)? }));

    let last = store.retrieve().await?;
    if let CachedFeed::Found { feed, .. } = &last {
        info!(items = feed.len(), "demo finished with the second feed cached");
    }
    steps.push(json!({ "step": "retrieve", "result": last }));

    Ok(json!({ "steps": steps, "counts": store.counts() }))
}

fn unix(secs: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("invalid unix timestamp {secs}"))
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}
