//! Master playlist building blocks.

use serde::{Deserialize, Serialize};
use sl_core::QualityPreset;

/// One rendition row of a master playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Peak bandwidth, bits per second.
    pub bandwidth: u64,
    /// Average bandwidth, bits per second.
    pub average_bandwidth: u64,
    /// Frame size as (width, height).
    pub resolution: (u32, u32),
    /// RFC 6381 codec string.
    pub codecs: String,
    /// Relative URI of the rendition's media playlist.
    pub uri: String,
}

impl Variant {
    /// Build a variant from a ladder rung and the URI of its media playlist.
    pub fn from_preset(preset: QualityPreset, uri: impl Into<String>) -> Self {
        Self {
            bandwidth: preset.bandwidth(),
            average_bandwidth: preset.average_bandwidth(),
            resolution: (preset.width(), preset.height()),
            codecs: preset.codecs().to_string(),
            uri: uri.into(),
        }
    }
}

/// The rendition set a player picks from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterPlaylist {
    /// Stream variants, highest resolution first.
    pub variants: Vec<Variant>,
}
