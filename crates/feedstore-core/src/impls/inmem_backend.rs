//! InMemoryBackend - 開発・テスト用のバックエンド
//!
//! `Option<CacheSnapshot>` を 1 つ持つだけの実装です。
//! 障害注入（Fault）で失敗パスもテストできます。

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{BackendError, CacheSnapshot};
use crate::ports::SnapshotBackend;

/// Backend primitive that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Read,
    Write,
    Clear,
}

/// Non-durable backend: the snapshot lives as long as the store does.
///
/// # 使用例
/// ```ignore
/// let backend = InMemoryBackend::new().inject_fault(Fault::Write);
/// let store = FeedStoreBuilder::new().backend(backend).build()?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    snapshot: Option<CacheSnapshot>,
    faults: HashSet<Fault>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if persisted by an earlier run.
    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            faults: HashSet::new(),
        }
    }

    /// Make every call to the given primitive fail with `Unavailable`.
    pub fn inject_fault(mut self, fault: Fault) -> Self {
        self.faults.insert(fault);
        self
    }

    fn check(&self, fault: Fault) -> Result<(), BackendError> {
        if self.faults.contains(&fault) {
            return Err(BackendError::Unavailable(format!(
                "injected {fault:?} fault"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotBackend for InMemoryBackend {
    async fn read_snapshot(&mut self) -> Result<Option<CacheSnapshot>, BackendError> {
        self.check(Fault::Read)?;
        Ok(self.snapshot.clone())
    }

    async fn write_snapshot(&mut self, snapshot: CacheSnapshot) -> Result<(), BackendError> {
        // A failed write leaves the old snapshot in place.
        self.check(Fault::Write)?;
        self.snapshot = Some(snapshot);
        Ok(())
    }

    async fn clear_snapshot(&mut self) -> Result<(), BackendError> {
        self.check(Fault::Clear)?;
        self.snapshot = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeedImageRecord, ImageId};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn snapshot(n: u128, secs: i64) -> CacheSnapshot {
        CacheSnapshot::new(
            vec![FeedImageRecord::new(ImageId::from_u128(n), format!("https://{n}"))],
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn starts_empty() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.read_snapshot().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_replaces_previous_snapshot() {
        let mut backend = InMemoryBackend::with_snapshot(snapshot(1, 100));
        backend.write_snapshot(snapshot(2, 200)).await.unwrap();
        assert_eq!(backend.read_snapshot().await.unwrap(), Some(snapshot(2, 200)));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let mut backend = InMemoryBackend::with_snapshot(snapshot(1, 100));
        backend.clear_snapshot().await.unwrap();
        backend.clear_snapshot().await.unwrap();
        assert_eq!(backend.read_snapshot().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_fault_keeps_prior_snapshot() {
        let mut backend =
            InMemoryBackend::with_snapshot(snapshot(1, 100)).inject_fault(Fault::Write);

        let err = backend.write_snapshot(snapshot(2, 200)).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert_eq!(backend.read_snapshot().await.unwrap(), Some(snapshot(1, 100)));
    }

    #[rstest]
    #[case::read(Fault::Read)]
    #[case::write(Fault::Write)]
    #[case::clear(Fault::Clear)]
    #[tokio::test]
    async fn injected_fault_only_hits_its_primitive(#[case] fault: Fault) {
        let mut backend = InMemoryBackend::new().inject_fault(fault);

        let read = backend.read_snapshot().await;
        let write = backend.write_snapshot(snapshot(1, 100)).await;
        let clear = backend.clear_snapshot().await;

        assert_eq!(read.is_err(), fault == Fault::Read);
        assert_eq!(write.is_err(), fault == Fault::Write);
        assert_eq!(clear.is_err(), fault == Fault::Clear);
    }
}
