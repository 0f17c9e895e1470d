//! On-disk representation of a cached feed.
//!
//! Kept separate from the domain types so the file format can evolve
//! (`version`) without touching the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use feedstore_core::{BackendError, CacheSnapshot, FeedImageRecord, ImageId};

/// Current file format version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCache {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub items: Vec<StoredImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub id: ImageId,
    pub image_description: Option<String>,
    pub location: Option<String>,
    pub url: String,
}

impl From<&FeedImageRecord> for StoredImage {
    fn from(record: &FeedImageRecord) -> Self {
        Self {
            id: record.id,
            image_description: record.description.clone(),
            location: record.location.clone(),
            url: record.url.clone(),
        }
    }
}

impl From<StoredImage> for FeedImageRecord {
    fn from(stored: StoredImage) -> Self {
        Self {
            id: stored.id,
            description: stored.image_description,
            location: stored.location,
            url: stored.url,
        }
    }
}

impl From<&CacheSnapshot> for StoredCache {
    fn from(snapshot: &CacheSnapshot) -> Self {
        Self {
            version: SCHEMA_VERSION,
            timestamp: snapshot.timestamp,
            items: snapshot.feed.iter().map(StoredImage::from).collect(),
        }
    }
}

impl StoredCache {
    pub fn into_snapshot(self) -> CacheSnapshot {
        CacheSnapshot::new(
            self.items.into_iter().map(FeedImageRecord::from).collect(),
            self.timestamp,
        )
    }
}

pub fn encode(snapshot: &CacheSnapshot) -> Result<Vec<u8>, BackendError> {
    serde_json::to_vec_pretty(&StoredCache::from(snapshot))
        .map_err(|e| BackendError::Unavailable(format!("failed to encode cache: {e}")))
}

pub fn decode(bytes: &[u8]) -> Result<CacheSnapshot, BackendError> {
    let stored: StoredCache =
        serde_json::from_slice(bytes).map_err(|e| BackendError::Corrupt(e.to_string()))?;
    if stored.version != SCHEMA_VERSION {
        return Err(BackendError::Corrupt(format!(
            "unsupported cache file version {} (expected {SCHEMA_VERSION})",
            stored.version
        )));
    }
    Ok(stored.into_snapshot())
}
