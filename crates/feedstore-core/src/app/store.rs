//! FeedCacheStore - 単一スロットのフィードキャッシュ
//!
//! # 直列実行
//! - ストアごとに 1 つの tokio タスク（ワーカー）がバックエンドを所有する
//! - 操作は mpsc キューに積まれ、ワーカーが 1 件ずつ処理する
//! - 操作 A の完了通知は、後続の操作 B が始まる前に必ず届く
//!
//! # 学習ポイント
//! - 呼び出し時点で enqueue するので、順序は「poll 順」ではなく「呼び出し順」
//! - Future 版は callback 版の上に oneshot で載せているだけ
//! - 完了通知は Drop ガードで包むので、ワーカーが消えても必ず 1 回届く

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, debug, error, info_span, warn};

use super::status::{Counters, Op, OperationCounts};
use crate::domain::{CacheSnapshot, CachedFeed, FeedImageRecord, StoreError};
use crate::ports::SnapshotBackend;

type Callback<T> = Box<dyn FnOnce(Result<T, StoreError>) + Send + 'static>;

/// Completion handed to the worker. Runs exactly once.
///
/// If it is dropped unfired (queue dropped with the runtime, worker task
/// panicked mid-operation) it reports `StoreError::Shutdown`.
struct Completion<T> {
    callback: Option<Callback<T>>,
}

impl<T> Completion<T> {
    fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T, StoreError>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Run the callback. Returns `false` if it panicked.
    fn fire(mut self, result: Result<T, StoreError>) -> bool {
        match self.callback.take() {
            Some(callback) => panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_ok(),
            None => true,
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            // may run while unwinding; a second panic here would abort
            let fired =
                panic::catch_unwind(AssertUnwindSafe(|| callback(Err(StoreError::Shutdown))));
            if fired.is_err() {
                error!("completion callback panicked");
            }
        }
    }
}

enum Command {
    Retrieve {
        done: Completion<CachedFeed>,
    },
    Insert {
        snapshot: CacheSnapshot,
        done: Completion<()>,
    },
    Delete {
        done: Completion<()>,
    },
}

/// Single-slot, timestamped cache of an ordered feed.
///
/// Every operation is queued onto the store's own worker task and executed
/// one at a time in submission order, across all clones of the handle.
/// Dropping the last handle lets the worker drain what is already queued and
/// exit; nothing submitted is ever cancelled.
///
/// Build one with [`FeedStoreBuilder`](super::FeedStoreBuilder).
#[derive(Clone)]
pub struct FeedCacheStore {
    tx: mpsc::UnboundedSender<Command>,
    counts: Arc<Counters>,
    // never written; closes when the worker future is dropped
    stopped: watch::Receiver<()>,
}

impl FeedCacheStore {
    pub fn builder() -> super::FeedStoreBuilder {
        super::FeedStoreBuilder::new()
    }

    pub(crate) fn spawn(runtime: &Handle, label: String, backend: Box<dyn SnapshotBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stopped_tx, stopped) = watch::channel(());
        let counts = Arc::new(Counters::default());

        let span = info_span!("feed_store", store = %label, backend = %backend.describe());
        runtime.spawn(run_worker(backend, rx, Arc::clone(&counts), stopped_tx).instrument(span));

        Self { tx, counts, stopped }
    }

    // ------------------------------------------------------------------
    // Future API
    // ------------------------------------------------------------------

    /// Read the current snapshot. Never mutates stored state.
    pub fn retrieve(&self) -> Pending<CachedFeed> {
        let (pending, done) = Pending::channel();
        self.retrieve_with(done);
        pending
    }

    /// Replace the cached feed (or create it) with `feed` stamped at
    /// `timestamp`. Record order is preserved exactly.
    pub fn insert(&self, feed: Vec<FeedImageRecord>, timestamp: DateTime<Utc>) -> Pending<()> {
        let (pending, done) = Pending::channel();
        self.insert_with(feed, timestamp, done);
        pending
    }

    /// Remove the cached feed. Succeeds on an empty store.
    pub fn delete_cached_feed(&self) -> Pending<()> {
        let (pending, done) = Pending::channel();
        self.delete_cached_feed_with(done);
        pending
    }

    // ------------------------------------------------------------------
    // Callback API
    // ------------------------------------------------------------------

    /// Callback form of [`retrieve`](Self::retrieve). `done` runs once on the
    /// store's worker, before the next queued operation starts.
    pub fn retrieve_with<F>(&self, done: F)
    where
        F: FnOnce(Result<CachedFeed, StoreError>) + Send + 'static,
    {
        self.submit(Command::Retrieve {
            done: Completion::new(done),
        });
    }

    pub fn insert_with<F>(&self, feed: Vec<FeedImageRecord>, timestamp: DateTime<Utc>, done: F)
    where
        F: FnOnce(Result<(), StoreError>) + Send + 'static,
    {
        self.submit(Command::Insert {
            snapshot: CacheSnapshot::new(feed, timestamp),
            done: Completion::new(done),
        });
    }

    pub fn delete_cached_feed_with<F>(&self, done: F)
    where
        F: FnOnce(Result<(), StoreError>) + Send + 'static,
    {
        self.submit(Command::Delete {
            done: Completion::new(done),
        });
    }

    // ------------------------------------------------------------------

    /// Operations finished so far.
    pub fn counts(&self) -> OperationCounts {
        self.counts.snapshot()
    }

    /// Drop this handle and wait for the worker to finish.
    ///
    /// The worker exits once every clone is gone and the queue is drained, so
    /// this waits for other clones too. Any number of clones may call it; each
    /// returns only after the worker has stopped.
    pub async fn shutdown(self) {
        let FeedCacheStore { tx, mut stopped, .. } = self;
        drop(tx);

        // Err once the worker drops its sender
        while stopped.changed().await.is_ok() {}
    }

    fn submit(&self, command: Command) {
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            warn!("feed store worker is gone; rejecting operation");
            // the completion guard reports Shutdown
            drop(command);
        }
    }
}

impl fmt::Debug for FeedCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedCacheStore")
            .field("counts", &self.counts())
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

/// Result of a store operation that has been queued.
///
/// The operation is already submitted when this value is created; dropping
/// it only discards the result.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, StoreError>>,
}

impl<T: Send + 'static> Pending<T> {
    fn channel() -> (Self, impl FnOnce(Result<T, StoreError>) + Send + 'static) {
        let (tx, rx) = oneshot::channel();
        let done = move |result: Result<T, StoreError>| {
            // receiver may already be dropped
            let _ = tx.send(result);
        };
        (Self { rx }, done)
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StoreError::Shutdown)))
    }
}

async fn run_worker(
    mut backend: Box<dyn SnapshotBackend>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    counts: Arc<Counters>,
    _stopped: watch::Sender<()>,
) {
    debug!("feed store worker started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Retrieve { done } => {
                let result = backend
                    .read_snapshot()
                    .await
                    .map(CachedFeed::from)
                    .map_err(StoreError::Read);
                let items = match &result {
                    Ok(CachedFeed::Found { feed, .. }) => feed.len(),
                    _ => 0,
                };
                finish(&counts, Op::Retrieve, items, result, done);
            }
            Command::Insert { snapshot, done } => {
                let items = snapshot.feed.len();
                let result = backend
                    .write_snapshot(snapshot)
                    .await
                    .map_err(StoreError::Write);
                finish(&counts, Op::Insert, items, result, done);
            }
            Command::Delete { done } => {
                let result = backend.clear_snapshot().await.map_err(StoreError::Delete);
                finish(&counts, Op::Delete, 0, result, done);
            }
        }
    }

    debug!("feed store worker stopped");
}

fn finish<T>(
    counts: &Counters,
    op: Op,
    items: usize,
    result: Result<T, StoreError>,
    done: Completion<T>,
) {
    counts.record(op, result.is_ok());
    match &result {
        Ok(_) => debug!(op = op.as_str(), items, "operation completed"),
        Err(e) => warn!(
            op = op.as_str(),
            error = %e,
            cause = ?e.backend_error(),
            "operation failed"
        ),
    }

    // A panicking callback must not take the worker (and every queued
    // operation behind it) down with it.
    if !done.fire(result) {
        error!(op = op.as_str(), "completion callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendError, ErrorKind, ImageId};
    use crate::impls::{Fault, InMemoryBackend};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn image(n: u128) -> FeedImageRecord {
        FeedImageRecord::new(ImageId::from_u128(n), format!("https://example.com/{n}"))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn store_with(backend: impl SnapshotBackend) -> FeedCacheStore {
        FeedCacheStore::builder().backend(backend).build().unwrap()
    }

    /// Backend that sleeps inside every call and records when calls begin
    /// and end, so overlapping execution would show up in the log.
    #[derive(Clone, Default)]
    struct SlowBackend {
        inner: Arc<StdMutex<Option<CacheSnapshot>>>,
        log: Arc<StdMutex<Vec<String>>>,
    }

    impl SlowBackend {
        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl SnapshotBackend for SlowBackend {
        async fn read_snapshot(&mut self) -> Result<Option<CacheSnapshot>, BackendError> {
            self.push("read:start".into());
            tokio::time::sleep(Duration::from_millis(5)).await;
            let snapshot = self.inner.lock().unwrap().clone();
            self.push("read:end".into());
            Ok(snapshot)
        }

        async fn write_snapshot(&mut self, snapshot: CacheSnapshot) -> Result<(), BackendError> {
            self.push("write:start".into());
            tokio::time::sleep(Duration::from_millis(5)).await;
            *self.inner.lock().unwrap() = Some(snapshot);
            self.push("write:end".into());
            Ok(())
        }

        async fn clear_snapshot(&mut self) -> Result<(), BackendError> {
            self.push("clear:start".into());
            tokio::time::sleep(Duration::from_millis(5)).await;
            *self.inner.lock().unwrap() = None;
            self.push("clear:end".into());
            Ok(())
        }

        fn describe(&self) -> String {
            "slow".into()
        }
    }

    #[tokio::test]
    async fn operations_resolve_in_call_order_even_when_awaited_out_of_order() {
        let store = store_with(InMemoryBackend::new());

        let insert = store.insert(vec![image(1)], at(100));
        let retrieve = store.retrieve();
        let delete = store.delete_cached_feed();
        let retrieve_after_delete = store.retrieve();

        // poll in reverse: submission order was fixed at call time
        assert_eq!(retrieve_after_delete.await.unwrap(), CachedFeed::Empty);
        delete.await.unwrap();
        assert_eq!(
            retrieve.await.unwrap(),
            CachedFeed::Found {
                feed: vec![image(1)],
                timestamp: at(100),
            }
        );
        insert.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_future_does_not_cancel_operation() {
        let store = store_with(InMemoryBackend::new());

        drop(store.insert(vec![image(1)], at(100)));

        let found = store.retrieve().await.unwrap();
        assert!(!found.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn backend_calls_never_overlap() {
        let backend = SlowBackend::default();
        let log = Arc::clone(&backend.log);
        let store = store_with(backend);

        let mut tasks = Vec::new();
        for n in 0..8u128 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.insert(vec![image(n)], at(n as i64)).await.unwrap();
                store.retrieve().await.unwrap();
                store.delete_cached_feed().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 8 * 3 * 2);
        for pair in log.chunks(2) {
            let (op, _) = pair[0].split_once(':').unwrap();
            assert_eq!(pair[0], format!("{op}:start"));
            assert_eq!(pair[1], format!("{op}:end"));
        }
    }

    #[tokio::test]
    async fn callback_fires_before_next_operation_starts() {
        let backend = SlowBackend::default();
        let log = Arc::clone(&backend.log);
        let store = store_with(backend);

        let cb_log = Arc::clone(&log);
        store.insert_with(vec![image(1)], at(1), move |result| {
            assert!(result.is_ok());
            cb_log.lock().unwrap().push("insert:done".into());
        });
        store.retrieve().await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec!["write:start", "write:end", "insert:done", "read:start", "read:end"]
        );
    }

    #[tokio::test]
    async fn panicking_callback_does_not_stop_the_worker() {
        let store = store_with(InMemoryBackend::new());

        store.retrieve_with(|_| panic!("boom"));

        store.insert(vec![image(1)], at(1)).await.unwrap();
        assert!(!store.retrieve().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_failure_is_reported_and_counted() {
        let store = store_with(InMemoryBackend::new().inject_fault(Fault::Read));

        let err = store.retrieve().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Read);
        assert!(matches!(err.backend_error(), Some(BackendError::Unavailable(_))));
        assert_eq!(
            store.counts(),
            OperationCounts {
                retrieves: 1,
                failures: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn write_failure_leaves_prior_snapshot_intact() {
        let seeded = CacheSnapshot::new(vec![image(1)], at(100));
        let store = store_with(InMemoryBackend::with_snapshot(seeded).inject_fault(Fault::Write));

        let err = store.insert(vec![image(2)], at(200)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);

        assert_eq!(
            store.retrieve().await.unwrap(),
            CachedFeed::Found {
                feed: vec![image(1)],
                timestamp: at(100),
            }
        );
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let seeded = CacheSnapshot::new(vec![image(1)], at(100));
        let store = store_with(InMemoryBackend::with_snapshot(seeded).inject_fault(Fault::Clear));

        let err = store.delete_cached_feed().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Delete);
        assert!(!store.retrieve().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_drains_queued_operations() {
        let backend = SlowBackend::default();
        let snapshot = Arc::clone(&backend.inner);
        let store = store_with(backend);

        let (tx, rx) = oneshot::channel();
        store.insert_with(vec![image(1)], at(1), move |result| {
            let _ = tx.send(result.is_ok());
        });
        store.shutdown().await;

        assert!(rx.await.unwrap());
        assert!(snapshot.lock().unwrap().is_some());
    }

    #[test]
    fn operations_after_runtime_shutdown_report_shutdown() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = runtime.block_on(async { store_with(InMemoryBackend::new()) });
        drop(runtime);

        let (tx, rx) = std::sync::mpsc::channel();
        store.retrieve_with(move |result| {
            tx.send(result.map(|_| ()).map_err(|e| e.kind())).unwrap();
        });
        assert_eq!(rx.recv().unwrap(), Err(ErrorKind::Shutdown));
    }

    #[test]
    fn queued_callback_fires_once_when_runtime_is_dropped() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = runtime.block_on(async { store_with(InMemoryBackend::new()) });

        let fired = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = std::sync::mpsc::channel();
        let counter = Arc::clone(&fired);
        // queued while the runtime is idle; the worker never gets to it
        store.retrieve_with(move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            tx.send(result.map(|_| ()).map_err(|e| e.kind())).unwrap();
        });
        drop(runtime);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(rx.recv().unwrap(), Err(ErrorKind::Shutdown));
    }

    struct PanickingBackend;

    #[async_trait]
    impl SnapshotBackend for PanickingBackend {
        async fn read_snapshot(&mut self) -> Result<Option<CacheSnapshot>, BackendError> {
            panic!("backend blew up");
        }

        async fn write_snapshot(&mut self, _: CacheSnapshot) -> Result<(), BackendError> {
            Ok(())
        }

        async fn clear_snapshot(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn describe(&self) -> String {
            "panicking".into()
        }
    }

    #[tokio::test]
    async fn backend_panic_fails_in_flight_and_queued_callbacks() {
        let store = store_with(PanickingBackend);

        let (read_tx, read_rx) = oneshot::channel();
        store.retrieve_with(move |result| {
            let _ = read_tx.send(result.map(|_| ()).map_err(|e| e.kind()));
        });
        let (delete_tx, delete_rx) = oneshot::channel();
        store.delete_cached_feed_with(move |result| {
            let _ = delete_tx.send(result.map_err(|e| e.kind()));
        });

        assert_eq!(read_rx.await.unwrap(), Err(ErrorKind::Shutdown));
        assert_eq!(delete_rx.await.unwrap(), Err(ErrorKind::Shutdown));
        let err = store.insert(vec![], at(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shutdown);
    }

    #[tokio::test]
    async fn every_clone_waits_in_shutdown() {
        let backend = SlowBackend::default();
        let snapshot = Arc::clone(&backend.inner);
        let store = store_with(backend);
        let other = store.clone();

        store.insert_with(vec![image(1)], at(1), |_| {});
        let first = tokio::spawn(store.shutdown());
        tokio::task::yield_now().await;

        // the last handle closes the queue; this call must still wait for the drain
        other.shutdown().await;
        assert!(snapshot.lock().unwrap().is_some());
        first.await.unwrap();
    }

    #[tokio::test]
    async fn debug_output_shows_counts() {
        let store = store_with(InMemoryBackend::new());
        store.retrieve().await.unwrap();

        let debug = format!("{store:?}");
        assert!(debug.starts_with("FeedCacheStore"));
        assert!(debug.contains("retrieves: 1"));
    }

    #[tokio::test]
    async fn counts_track_every_finished_operation() {
        let store = store_with(InMemoryBackend::new());

        store.retrieve().await.unwrap();
        store.insert(vec![], at(1)).await.unwrap();
        store.insert(vec![image(1)], at(2)).await.unwrap();
        store.delete_cached_feed().await.unwrap();

        assert_eq!(
            store.counts(),
            OperationCounts {
                retrieves: 1,
                inserts: 2,
                deletes: 1,
                failures: 0,
            }
        );
    }
}
