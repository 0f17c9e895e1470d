//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBackend**: プロセス内だけで生きるスナップショット（障害注入つき）
//!
//! # 本番用実装
//! 永続化する実装は別クレートに配置します：
//! - `feedstore-fs`: JsonFileBackend

pub mod inmem_backend;

// 主要な型を再エクスポート
pub use self::inmem_backend::{Fault, InMemoryBackend};
