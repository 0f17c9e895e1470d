//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（ファイル、組み込み DB など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ストアは具体的なバックエンド型に依存しない
//! - 開発・テスト用の実装は `impls`、本番用の実装は別クレート（`feedstore-fs`）

pub mod snapshot_backend;
pub mod clock;

// 主要な trait を再エクスポート
pub use self::snapshot_backend::SnapshotBackend;
pub use self::clock::{Clock, FixedClock, SystemClock};
