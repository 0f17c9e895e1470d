//! SnapshotBackend port - スナップショットの永続化
//!
//! ストアは単一のスロットしか持たないので、必要な操作は 3 つだけです：
//! - read: 現在のスナップショット（なければ None）
//! - write: 既存のスナップショットを原子的に置き換える
//! - clear: スナップショットを消す（空でも成功）

use async_trait::async_trait;

use crate::domain::{BackendError, CacheSnapshot};

/// Persistence primitive behind a `FeedCacheStore`.
///
/// Methods take `&mut self`: the store's worker is the only owner of its
/// backend, so no implementation needs its own locking to get serial access.
/// Sharing the underlying medium between several stores is the backend's own
/// isolation problem.
///
/// # Contract
/// - `read_snapshot` never mutates stored state.
/// - `write_snapshot` replaces atomically. If the old snapshot can be lost
///   without the new one landing, the call must still return `Err`.
/// - `clear_snapshot` on an empty backend is `Ok(())`.
/// - id, description, location, url and timestamp round-trip losslessly at
///   the backend's precision.
#[async_trait]
pub trait SnapshotBackend: Send + 'static {
    async fn read_snapshot(&mut self) -> Result<Option<CacheSnapshot>, BackendError>;

    async fn write_snapshot(&mut self, snapshot: CacheSnapshot) -> Result<(), BackendError>;

    async fn clear_snapshot(&mut self) -> Result<(), BackendError>;

    /// Short human-readable description, used in log spans.
    fn describe(&self) -> String;
}

