//! App - アプリケーション層
//!
//! ports を組み合わせてストア本体を実装します。
//!
//! # 主要コンポーネント
//! - **FeedStoreBuilder**: ストアの構築とワイヤリング（Fail-fast）
//! - **FeedCacheStore**: retrieve / insert / delete を直列に実行するストア
//! - **OperationCounts**: 実行済み操作のカウンタ

pub mod builder;
pub mod store;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, FeedStoreBuilder};
pub use self::store::{FeedCacheStore, Pending};
pub use self::status::OperationCounts;
