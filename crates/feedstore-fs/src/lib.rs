//! feedstore-fs
//!
//! Durable `SnapshotBackend` that keeps the cached feed in a single JSON file.
//!
//! # 設計原則
//! - 書き込みは一時ファイル → fsync → rename で原子的に置き換える
//! - ファイルがなければ「空」、消すときもなければ成功
//! - ディスク上のスキーマ（`schema`）はドメイン型とは分けて持つ

pub mod backend;
pub mod schema;

pub use backend::JsonFileBackend;
pub use schema::{SCHEMA_VERSION, StoredCache, StoredImage};
