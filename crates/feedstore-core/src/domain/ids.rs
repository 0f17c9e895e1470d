//! Feed image identifiers.
//!
//! ULID を使った不透明な ID です。
//! - 生成順にソート可能
//! - 調整なしで複数プロセスから生成可能
//! - 128-bit（UUID と同じサイズ）
//!
//! 既存フィードの UUID 文字列もそのまま読み込めます（同じ 128 bit として保持）。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;
use uuid::Uuid;

/// Identifier of a single feed image.
///
/// Parsed from either a ULID or a UUID string; always displayed and
/// serialized as the canonical 26-character ULID string.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(Ulid);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid image id {0:?}: expected a ULID or UUID")]
pub struct ParseImageIdError(String);

impl ImageId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Build an id from a raw integer. Handy for fixtures.
    pub fn from_u128(value: u128) -> Self {
        Self(Ulid(value))
    }
}

impl FromStr for ImageId {
    type Err = ParseImageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ulid) = Ulid::from_string(s) {
            return Ok(Self(ulid));
        }
        Uuid::parse_str(s)
            .map(|uuid| Self::from_u128(uuid.as_u128()))
            .map_err(|_| ParseImageIdError(s.to_owned()))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ImageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
