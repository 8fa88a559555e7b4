//! The adaptive-bitrate quality ladder.
//!
//! Every rendition the pipeline can produce is declared here as a variant of
//! [`QualityPreset`], largest resolution first. The ladder is a closed enum
//! rather than configuration: a rung cannot be mistyped, and exhaustive
//! matches keep dimensions, bitrates, and codec strings in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// QualityPreset
// ---------------------------------------------------------------------------

/// A rung of the adaptive-bitrate ladder.
///
/// Declaration order is largest-first and `Ord` follows declaration order, so
/// iterating [`QualityPreset::all`] or a `BTreeMap` keyed by preset always
/// visits 1080p before 720p and so on down the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityPreset {
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl QualityPreset {
    /// All presets, largest resolution first.
    pub const fn all() -> [QualityPreset; 4] {
        [Self::P1080, Self::P720, Self::P480, Self::P360]
    }

    /// Human-readable label. Identical to the serde form and to the
    /// per-quality folder name on disk.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }

    /// Target frame width in pixels.
    pub const fn width(&self) -> u32 {
        match self {
            Self::P1080 => 1920,
            Self::P720 => 1280,
            Self::P480 => 854,
            Self::P360 => 640,
        }
    }

    /// Target frame height in pixels.
    pub const fn height(&self) -> u32 {
        match self {
            Self::P1080 => 1080,
            Self::P720 => 720,
            Self::P480 => 480,
            Self::P360 => 360,
        }
    }

    /// Target video bitrate in bits per second.
    pub const fn video_bitrate(&self) -> u64 {
        match self {
            Self::P1080 => 5_000_000,
            Self::P720 => 2_800_000,
            Self::P480 => 1_400_000,
            Self::P360 => 800_000,
        }
    }

    /// Peak (maxrate) video bitrate in bits per second.
    pub const fn peak_video_bitrate(&self) -> u64 {
        match self {
            Self::P1080 => 5_350_000,
            Self::P720 => 2_996_000,
            Self::P480 => 1_498_000,
            Self::P360 => 856_000,
        }
    }

    /// Audio bitrate in bits per second.
    pub const fn audio_bitrate(&self) -> u64 {
        match self {
            Self::P1080 => 192_000,
            Self::P720 => 128_000,
            Self::P480 => 128_000,
            Self::P360 => 96_000,
        }
    }

    /// `BANDWIDTH` attribute for the master playlist: peak video plus audio,
    /// guaranteed strictly positive.
    pub fn bandwidth(&self) -> u64 {
        (self.peak_video_bitrate() + self.audio_bitrate()).max(1)
    }

    /// `AVERAGE-BANDWIDTH` attribute for the master playlist: target video
    /// plus audio, guaranteed strictly positive.
    pub fn average_bandwidth(&self) -> u64 {
        (self.video_bitrate() + self.audio_bitrate()).max(1)
    }

    /// RFC 6381 codec string for the rendition (H.264 + AAC-LC).
    pub const fn codecs(&self) -> &'static str {
        match self {
            Self::P1080 => "avc1.640028,mp4a.40.2",
            Self::P720 => "avc1.64001f,mp4a.40.2",
            Self::P480 => "avc1.64001e,mp4a.40.2",
            Self::P360 => "avc1.64001e,mp4a.40.2",
        }
    }

    /// Largest preset whose height does not exceed `height`, or `None` when
    /// the source is smaller than every rung of the ladder.
    pub fn floor_for_height(height: u32) -> Option<QualityPreset> {
        Self::all().into_iter().find(|p| p.height() <= height)
    }

    /// Quality label describing a source of the given height: the nearest
    /// preset at or below it, or `"original"` when no preset fits.
    pub fn original_quality_label(height: u32) -> &'static str {
        match Self::floor_for_height(height) {
            Some(preset) => preset.label(),
            None => "original",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
