//! Feed image record.

use serde::{Deserialize, Serialize};

use super::ids::ImageId;

/// One image in a cached feed.
///
/// Immutable value. The store never looks inside it; it only preserves it
/// (and its position in the feed) exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedImageRecord {
    pub id: ImageId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub url: String,
}

impl FeedImageRecord {
    pub fn new(id: ImageId, url: impl Into<String>) -> Self {
        Self {
            id,
            description: None,
            location: None,
            url: url.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
