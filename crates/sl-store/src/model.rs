//! The per-video transcode job snapshot and its state enums.
//!
//! All enums serialize in snake_case and implement `Display` manually for
//! consistent string representation in logs and API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sl_core::{QualityPreset, VideoId};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Overall lifecycle state of a transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Running,
    Stopped,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// VariantState
// ---------------------------------------------------------------------------

/// Lifecycle state of a single quality rendition.
///
/// `Succeeded` and `Skipped` are terminal across resumes: a resume resets
/// every other state back to `Pending`. `Skipped` marks a preset above the
/// source resolution; it is never encoded and never appears in the master
/// playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for VariantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// VariantRecord
// ---------------------------------------------------------------------------

/// Progress record for one quality rendition of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub state: VariantState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Playlist path relative to the video folder, e.g. `720p/index.m3u8`.
    /// Set only on success.
    pub playlist: Option<String>,
    /// Failure detail. Set only on failure.
    pub error: Option<String>,
}

impl VariantRecord {
    /// A fresh, never-attempted record.
    pub fn pending() -> Self {
        Self {
            state: VariantState::Pending,
            started_at: None,
            finished_at: None,
            playlist: None,
            error: None,
        }
    }

    /// Mark the rendition as in flight, clearing any earlier outcome.
    pub fn begin(&mut self) {
        self.state = VariantState::Running;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.playlist = None;
        self.error = None;
    }

    /// Mark the rendition as succeeded with its verified playlist path.
    pub fn succeed(&mut self, playlist: String) {
        self.state = VariantState::Succeeded;
        self.finished_at = Some(Utc::now());
        self.playlist = Some(playlist);
        self.error = None;
    }

    /// Mark the rendition as failed with a human-readable reason.
    pub fn fail(&mut self, error: String) {
        self.state = VariantState::Failed;
        self.finished_at = Some(Utc::now());
        self.playlist = None;
        self.error = Some(error);
    }

    /// Mark the rendition as skipped (preset above the source resolution).
    pub fn skip(&mut self) {
        self.state = VariantState::Skipped;
        self.finished_at = Some(Utc::now());
        self.playlist = None;
        self.error = None;
    }

    /// Whether a resume should leave this record alone.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, VariantState::Succeeded | VariantState::Skipped)
    }
}

impl Default for VariantRecord {
    fn default() -> Self {
        Self::pending()
    }
}

// ---------------------------------------------------------------------------
// TranscodeStatus
// ---------------------------------------------------------------------------

/// Durable snapshot of one video's transcode job.
///
/// Serialized as `status.json` inside the video folder. The `variants` map is
/// keyed by preset, so iteration visits the ladder largest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeStatus {
    pub video_id: VideoId,
    pub state: JobState,
    /// User-requested stop. Independent of `state`: it survives restarts and
    /// is honored at the next preset boundary.
    pub stop_requested: bool,
    pub source_name: Option<String>,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    /// Nearest preset label at or below the source height, or `"original"`.
    pub original_quality: Option<String>,
    /// Client-measured bandwidth hint in bits per second, recorded verbatim.
    pub network_speed_hint: Option<u64>,
    /// Job-level failure detail.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub variants: BTreeMap<QualityPreset, VariantRecord>,
}

impl TranscodeStatus {
    /// A fresh snapshot for a video that has never been transcoded.
    pub fn new(video_id: VideoId) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            state: JobState::NotStarted,
            stop_requested: false,
            source_name: None,
            original_width: None,
            original_height: None,
            original_quality: None,
            network_speed_hint: None,
            error: None,
            created_at: now,
            updated_at: now,
            variants: BTreeMap::new(),
        }
    }

    /// Insert a pending record for every ladder preset that has none yet.
    /// Existing records are left untouched.
    pub fn ensure_ladder(&mut self) {
        for preset in QualityPreset::all() {
            self.variants
                .entry(preset)
                .or_insert_with(VariantRecord::pending);
        }
    }

    /// Prepare the snapshot for another run: clear the stop flag and the
    /// job-level error, and reset every non-settled record to pending.
    /// Succeeded and skipped renditions are never re-attempted.
    pub fn reset_for_resume(&mut self) {
        self.stop_requested = false;
        self.error = None;
        for record in self.variants.values_mut() {
            if !record.is_settled() {
                *record = VariantRecord::pending();
            }
        }
    }

    /// Succeeded renditions with their playlist paths, largest first.
    pub fn succeeded_playlists(&self) -> Vec<(QualityPreset, String)> {
        self.variants
            .iter()
            .filter(|(_, r)| r.state == VariantState::Succeeded)
            .filter_map(|(p, r)| r.playlist.clone().map(|pl| (*p, pl)))
            .collect()
    }

    /// Number of succeeded renditions.
    pub fn succeeded_count(&self) -> u64 {
        self.variants
            .values()
            .filter(|r| r.state == VariantState::Succeeded)
            .count() as u64
    }
}
