//! Cache snapshot and retrieval result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::FeedImageRecord;

/// The single unit of storage: an ordered feed plus the time it was cached.
///
/// There is never more than one live snapshot per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub feed: Vec<FeedImageRecord>,
    pub timestamp: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(feed: Vec<FeedImageRecord>, timestamp: DateTime<Utc>) -> Self {
        Self { feed, timestamp }
    }
}

/// Result of a successful retrieve.
///
/// Staleness is the caller's business: compare `timestamp` against your own
/// policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedFeed {
    Empty,
    Found {
        feed: Vec<FeedImageRecord>,
        timestamp: DateTime<Utc>,
    },
}

impl CachedFeed {
    pub fn is_empty(&self) -> bool {
        matches!(self, CachedFeed::Empty)
    }

    /// Consume into the underlying snapshot, if any.
    pub fn into_snapshot(self) -> Option<CacheSnapshot> {
        match self {
            CachedFeed::Empty => None,
            CachedFeed::Found { feed, timestamp } => Some(CacheSnapshot { feed, timestamp }),
        }
    }
}

impl From<Option<CacheSnapshot>> for CachedFeed {
    fn from(snapshot: Option<CacheSnapshot>) -> Self {
        match snapshot {
            None => CachedFeed::Empty,
            Some(CacheSnapshot { feed, timestamp }) => CachedFeed::Found { feed, timestamp },
        }
    }
}
