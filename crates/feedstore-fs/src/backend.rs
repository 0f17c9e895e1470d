//! JsonFileBackend - JSON ファイル 1 つにスナップショットを保存する
//!
//! # 書き込み手順
//! 1. `<file>.tmp` に全体を書く
//! 2. fsync
//! 3. rename で本体を置き換える（同一ディレクトリ内なので原子的）
//! 4. 親ディレクトリを fsync して rename 自体を永続化する
//!
//! 削除も同様に、remove 後に親ディレクトリを fsync します。
//!
//! 途中で失敗しても本体は古いスナップショットのまま残ります。

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use feedstore_core::{BackendError, CacheSnapshot, SnapshotBackend};

use crate::schema;

/// Durable backend storing the snapshot as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    temp_path: PathBuf,
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Validate `path` and build the backend.
    ///
    /// Fails when the path names a directory or its parent directory does
    /// not exist. The file itself need not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();

        if path.is_dir() {
            return Err(BackendError::Unavailable(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let Some(file_name) = path.file_name() else {
            return Err(BackendError::Unavailable(format!(
                "{} does not name a file",
                path.display()
            )));
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(BackendError::Unavailable(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }

        let mut temp_name = OsString::from(file_name);
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let dir = parent.to_path_buf();
        Ok(Self {
            path,
            temp_path,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_temp(&self, bytes: &[u8]) -> Result<(), std::io::Error> {
        let mut file = fs::File::create(&self.temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// Flush directory entries (renames, removals) in `dir` to disk.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), std::io::Error> {
    fs::File::open(dir).await?.sync_all().await
}

// directories cannot be opened for fsync here
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), std::io::Error> {
    Ok(())
}

#[async_trait]
impl SnapshotBackend for JsonFileBackend {
    async fn read_snapshot(&mut self) -> Result<Option<CacheSnapshot>, BackendError> {
        match fs::read(&self.path).await {
            Ok(bytes) => schema::decode(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_snapshot(&mut self, snapshot: CacheSnapshot) -> Result<(), BackendError> {
        let bytes = schema::encode(&snapshot)?;

        let written = match self.write_temp(&bytes).await {
            Ok(()) => fs::rename(&self.temp_path, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&self.temp_path).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(path = %self.temp_path.display(), error = %cleanup, "failed to remove temp file");
            }
            return Err(e.into());
        }
        sync_dir(&self.dir).await?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "cache file replaced");
        Ok(())
    }

    async fn clear_snapshot(&mut self) -> Result<(), BackendError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                sync_dir(&self.dir).await?;
                debug!(path = %self.path.display(), "cache file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("json-file:{}", self.path.display())
    }
}
