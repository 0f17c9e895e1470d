//! Errors - エラー型と分類
//!
//! - BackendError: バックエンド（ファイル、DB など）が返すエラー
//! - StoreError: ストア操作の結果として呼び出し側に届くエラー
//!
//! ストアはリトライもしないし、エラーを握りつぶしもしません。
//! バックエンドのエラーはそのまま `#[source]` として包んで返します。

use thiserror::Error;

/// Error produced by a persistence backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data exists but cannot be decoded.
    #[error("stored cache is corrupt: {0}")]
    Corrupt(String),

    /// Backend refused or could not serve the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Which store operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Read,
    Write,
    Delete,
    Shutdown,
}

/// Error delivered to the caller of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to retrieve cached feed")]
    Read(#[source] BackendError),

    #[error("failed to insert cached feed")]
    Write(#[source] BackendError),

    #[error("failed to delete cached feed")]
    Delete(#[source] BackendError),

    /// The store's worker is gone (its runtime was shut down).
    #[error("feed store worker has shut down")]
    Shutdown,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Read(_) => ErrorKind::Read,
            StoreError::Write(_) => ErrorKind::Write,
            StoreError::Delete(_) => ErrorKind::Delete,
            StoreError::Shutdown => ErrorKind::Shutdown,
        }
    }

    /// The backend error this failure wraps, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            StoreError::Read(e) | StoreError::Write(e) | StoreError::Delete(e) => Some(e),
            StoreError::Shutdown => None,
        }
    }
}
