//! Conformance - バックエンド共通の適合テスト
//!
//! どの `SnapshotBackend` の上に組んだストアでも満たすべき性質を
//! `assert_*` 関数として提供します。各関数は「空のストア」を受け取ります。
//!
//! ```ignore
//! #[tokio::test]
//! async fn insert_overrides_previous_values() {
//!     let store = make_store();
//!     conformance::assert_insert_overrides_previously_inserted_values(&store).await;
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::oneshot;

use crate::app::FeedCacheStore;
use crate::domain::{CachedFeed, ErrorKind, FeedImageRecord, ImageId, StoreError};

/// A small feed with every optional field exercised.
pub fn unique_feed(seed: u128) -> Vec<FeedImageRecord> {
    vec![
        FeedImageRecord::new(ImageId::from_u128(seed * 10 + 1), format!("https://feed.example/{seed}/1"))
            .with_description(format!("image {seed}-1"))
            .with_location(format!("location {seed}")),
        FeedImageRecord::new(ImageId::from_u128(seed * 10 + 2), format!("https://feed.example/{seed}/2")),
        FeedImageRecord::new(ImageId::from_u128(seed * 10 + 3), format!("https://feed.example/{seed}/3"))
            .with_description(format!("image {seed}-3")),
    ]
}

/// Timestamp with sub-second precision, to catch backends that truncate.
pub fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 123_456_789)
        .single()
        .unwrap_or_else(Utc::now)
}

fn found(feed: Vec<FeedImageRecord>, timestamp: DateTime<Utc>) -> CachedFeed {
    CachedFeed::Found { feed, timestamp }
}

async fn retrieve(store: &FeedCacheStore) -> CachedFeed {
    store.retrieve().await.expect("retrieve must succeed")
}

async fn insert(store: &FeedCacheStore, feed: Vec<FeedImageRecord>, at: DateTime<Utc>) {
    store.insert(feed, at).await.expect("insert must succeed");
}

async fn delete(store: &FeedCacheStore) {
    store
        .delete_cached_feed()
        .await
        .expect("delete must succeed");
}

// ----------------------------------------------------------------------------
// retrieve
// ----------------------------------------------------------------------------

pub async fn assert_retrieve_delivers_empty_on_empty_cache(store: &FeedCacheStore) {
    assert_eq!(retrieve(store).await, CachedFeed::Empty);
}

pub async fn assert_retrieve_has_no_side_effects_on_empty_cache(store: &FeedCacheStore) {
    assert_eq!(retrieve(store).await, CachedFeed::Empty);
    assert_eq!(retrieve(store).await, CachedFeed::Empty);
}

pub async fn assert_retrieve_delivers_found_values_on_non_empty_cache(store: &FeedCacheStore) {
    let feed = unique_feed(1);
    let at = timestamp(1_000);

    insert(store, feed.clone(), at).await;

    assert_eq!(retrieve(store).await, found(feed, at));
}

pub async fn assert_retrieve_has_no_side_effects_on_non_empty_cache(store: &FeedCacheStore) {
    let feed = unique_feed(1);
    let at = timestamp(1_000);

    insert(store, feed.clone(), at).await;

    assert_eq!(retrieve(store).await, found(feed.clone(), at));
    assert_eq!(retrieve(store).await, found(feed, at));
}

// ----------------------------------------------------------------------------
// insert
// ----------------------------------------------------------------------------

pub async fn assert_insert_delivers_no_error_on_empty_cache(store: &FeedCacheStore) {
    let result = store.insert(unique_feed(1), timestamp(1_000)).await;
    assert!(result.is_ok(), "expected insert to succeed, got {result:?}");
}

pub async fn assert_insert_delivers_no_error_on_non_empty_cache(store: &FeedCacheStore) {
    insert(store, unique_feed(1), timestamp(1_000)).await;

    let result = store.insert(unique_feed(2), timestamp(2_000)).await;
    assert!(result.is_ok(), "expected insert to succeed, got {result:?}");
}

pub async fn assert_insert_overrides_previously_inserted_values(store: &FeedCacheStore) {
    insert(store, unique_feed(1), timestamp(1_000)).await;

    let latest = unique_feed(2);
    let latest_at = timestamp(2_000);
    insert(store, latest.clone(), latest_at).await;

    assert_eq!(retrieve(store).await, found(latest, latest_at));
}

pub async fn assert_insert_accepts_empty_feed(store: &FeedCacheStore) {
    let at = timestamp(1_000);

    insert(store, Vec::new(), at).await;

    assert_eq!(retrieve(store).await, found(Vec::new(), at));
}

pub async fn assert_insert_preserves_record_order(store: &FeedCacheStore) {
    let mut feed = unique_feed(3);
    feed.extend(unique_feed(1));
    feed.extend(unique_feed(2));
    let at = timestamp(3_000);

    insert(store, feed.clone(), at).await;

    match retrieve(store).await {
        CachedFeed::Found { feed: stored, .. } => {
            let ids: Vec<_> = stored.iter().map(|r| r.id).collect();
            let expected: Vec<_> = feed.iter().map(|r| r.id).collect();
            assert_eq!(ids, expected);
        }
        CachedFeed::Empty => panic!("expected a cached feed after insert"),
    }
}

// ----------------------------------------------------------------------------
// delete
// ----------------------------------------------------------------------------

pub async fn assert_delete_delivers_no_error_on_empty_cache(store: &FeedCacheStore) {
    let result = store.delete_cached_feed().await;
    assert!(result.is_ok(), "expected delete to succeed, got {result:?}");
}

pub async fn assert_delete_has_no_side_effects_on_empty_cache(store: &FeedCacheStore) {
    delete(store).await;

    assert_eq!(retrieve(store).await, CachedFeed::Empty);
}

pub async fn assert_delete_delivers_no_error_on_non_empty_cache(store: &FeedCacheStore) {
    insert(store, unique_feed(1), timestamp(1_000)).await;

    let result = store.delete_cached_feed().await;
    assert!(result.is_ok(), "expected delete to succeed, got {result:?}");
}

pub async fn assert_delete_empties_previously_inserted_cache(store: &FeedCacheStore) {
    insert(store, unique_feed(1), timestamp(1_000)).await;

    delete(store).await;

    assert_eq!(retrieve(store).await, CachedFeed::Empty);
}

// ----------------------------------------------------------------------------
// serial execution
// ----------------------------------------------------------------------------

/// insert, delete, insert submitted back to back without awaiting: the
/// completions arrive in submission order and the last insert wins.
pub async fn assert_side_effects_run_serially(store: &FeedCacheStore) {
    let completed = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = oneshot::channel();

    let log = Arc::clone(&completed);
    store.insert_with(unique_feed(1), timestamp(1_000), move |_| {
        log.lock().unwrap().push("op1");
    });
    let log = Arc::clone(&completed);
    store.delete_cached_feed_with(move |_| {
        log.lock().unwrap().push("op2");
    });
    let log = Arc::clone(&completed);
    store.insert_with(unique_feed(3), timestamp(3_000), move |_| {
        log.lock().unwrap().push("op3");
        let _ = tx.send(());
    });

    rx.await.expect("last completion must fire");

    assert_eq!(*completed.lock().unwrap(), vec!["op1", "op2", "op3"]);
    assert_eq!(
        retrieve(store).await,
        found(unique_feed(3), timestamp(3_000))
    );
}

/// Several OS threads submit concurrently. Whatever order the submissions
/// land in, completions follow it exactly and the final state equals running
/// the same operations sequentially in that order.
pub async fn assert_concurrent_submissions_are_serialized(store: &FeedCacheStore) {
    const CALLERS: u128 = 6;

    // Submission and its log entry happen under one lock so the submission
    // log is the true queue order.
    let submitted: Arc<Mutex<Vec<u128>>> = Arc::new(Mutex::new(Vec::new()));
    // Results are only recorded here; a panic inside a completion would be
    // swallowed by the worker and leave `rx` waiting forever.
    let completed: Arc<Mutex<Vec<(u128, Result<(), ErrorKind>)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = oneshot::channel::<()>();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let handles: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let store = store.clone();
            let submitted = Arc::clone(&submitted);
            let completed = Arc::clone(&completed);
            let tx = Arc::clone(&tx);
            thread::spawn(move || {
                let mut order = submitted.lock().unwrap();
                let on_done = move |result: Result<(), StoreError>| {
                    let mut done = completed.lock().unwrap();
                    done.push((caller, result.map_err(|e| e.kind())));
                    if done.len() as u128 == CALLERS
                        && let Some(tx) = tx.lock().unwrap().take()
                    {
                        let _ = tx.send(());
                    }
                };
                // odd callers delete, even callers insert their own feed
                if caller % 2 == 0 {
                    store.insert_with(unique_feed(caller), timestamp(caller as i64), on_done);
                } else {
                    store.delete_cached_feed_with(on_done);
                }
                order.push(caller);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("submitting thread panicked");
    }
    rx.await.expect("all completions must fire");

    let completed = completed.lock().unwrap().clone();
    for (caller, result) in &completed {
        assert!(result.is_ok(), "operation {caller} failed: {result:?}");
    }
    let completion_order: Vec<u128> = completed.iter().map(|(caller, _)| *caller).collect();
    let submitted = submitted.lock().unwrap().clone();
    assert_eq!(completion_order, submitted);

    let last = *submitted.last().expect("at least one submission");
    let expected = if last % 2 == 0 {
        found(unique_feed(last), timestamp(last as i64))
    } else {
        CachedFeed::Empty
    };
    assert_eq!(retrieve(store).await, expected);
}

/// The worked example: a second insert fully replaces the first.
pub async fn assert_second_insert_replaces_first_exactly(store: &FeedCacheStore) {
    let first = vec![FeedImageRecord::new(ImageId::from_u128(1), "https://a")];
    let first_at = Utc.timestamp_opt(100, 0).single().unwrap_or_else(Utc::now);
    insert(store, first.clone(), first_at).await;
    assert_eq!(retrieve(store).await, found(first, first_at));

    let second = vec![
        FeedImageRecord::new(ImageId::from_u128(2), "https://b"),
        FeedImageRecord::new(ImageId::from_u128(3), "https://c"),
    ];
    let second_at = Utc.timestamp_opt(200, 0).single().unwrap_or_else(Utc::now);
    insert(store, second.clone(), second_at).await;
    assert_eq!(retrieve(store).await, found(second, second_at));
}
