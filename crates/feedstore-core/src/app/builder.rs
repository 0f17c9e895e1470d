//! FeedStoreBuilder - ストアの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - バックエンドが未指定なら build() でエラー
//! - tokio runtime の外で build() してもエラー（ワーカーを spawn できない）
//!
//! 操作ごとに「設定ミス」のエラーを返すことはしません。

use tokio::runtime::Handle;

use super::store::FeedCacheStore;
use crate::ports::SnapshotBackend;

/// BuildError はストア構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no snapshot backend configured; call `backend(..)` before `build()`")]
    MissingBackend,

    #[error("feed store must be built inside a tokio runtime")]
    NoRuntime,
}

/// # 使用例
/// ```ignore
/// let store = FeedStoreBuilder::new()
///     .backend(InMemoryBackend::new())
///     .label("home-feed")
///     .build()?;
/// ```
pub struct FeedStoreBuilder {
    backend: Option<Box<dyn SnapshotBackend>>,
    label: String,
}

impl FeedStoreBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            label: "feed".to_string(),
        }
    }

    /// Backend the store will own exclusively.
    pub fn backend<B: SnapshotBackend>(mut self, backend: B) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Name used in the store's log span.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Spawn the store's worker on the current tokio runtime.
    pub fn build(self) -> Result<FeedCacheStore, BuildError> {
        let backend = self.backend.ok_or(BuildError::MissingBackend)?;
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;
        Ok(FeedCacheStore::spawn(&runtime, self.label, backend))
    }
}

impl Default for FeedStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
