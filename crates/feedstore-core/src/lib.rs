//! feedstore-core
//!
//! Single-slot, timestamped cache for an ordered feed of images.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ImageId, FeedImageRecord, CacheSnapshot, CachedFeed, errors）
//! - **ports**: 抽象化レイヤー（SnapshotBackend, Clock）
//! - **app**: ストア本体（FeedStoreBuilder, FeedCacheStore, OperationCounts）
//! - **impls**: 実装（InMemoryBackend など開発・テスト用）
//! - **conformance**: どのバックエンドにも使える適合テスト（`conformance` feature）

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;

#[cfg(any(test, feature = "conformance"))]
pub mod conformance;

pub use app::{BuildError, FeedCacheStore, FeedStoreBuilder, OperationCounts, Pending};
pub use domain::{
    BackendError, CacheSnapshot, CachedFeed, ErrorKind, FeedImageRecord, ImageId, ParseImageIdError,
    StoreError,
};
pub use impls::{Fault, InMemoryBackend};
pub use ports::{Clock, FixedClock, SnapshotBackend, SystemClock};
