//! The [`VideoId`] identifier.
//!
//! A video's id is minted at registration and never changes. Its canonical
//! string form (lowercase hyphenated UUID) names the per-video folder under
//! the media root, so the same value round-trips through URLs, file paths,
//! and snapshot JSON without any mapping table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an uploaded video, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(Uuid);

impl VideoId {
    /// Mint a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        VideoId(Uuid::new_v4())
    }
}

impl Default for VideoId {
    fn default() -> Self {
        VideoId::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VideoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
