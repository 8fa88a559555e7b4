//! Progress events and the bus that fans them out.
//!
//! Every observable step of a transcode (queued, per-rendition progress,
//! terminal states, recovery scans) is broadcast as an [`Event`]. The
//! [`EventBus`] pairs a `tokio::sync::broadcast` channel for live listeners
//! with a small ring of recent events so an SSE client connecting after the
//! fact still sees how the job got where it is.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::VideoId;
use crate::quality::QualityPreset;

/// How many events the replay ring holds before the oldest fall off.
const RING_CAPACITY: usize = 100;

/// Broadcast channel depth used by [`EventBus::default`].
const DEFAULT_BUS_DEPTH: usize = 256;

// ---------------------------------------------------------------------------
// Payload variants
// ---------------------------------------------------------------------------

/// What a single event reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Job lifecycle -----------------------------------------------------
    TranscodeQueued { video_id: VideoId },
    TranscodeStarted { video_id: VideoId },
    TranscodeCompleted { video_id: VideoId, succeeded: u64 },
    TranscodeFailed { video_id: VideoId, error: String },
    TranscodeStopped { video_id: VideoId },

    // -- Variant lifecycle ---------------------------------------------------
    VariantStarted { video_id: VideoId, quality: QualityPreset },
    VariantSucceeded { video_id: VideoId, quality: QualityPreset },
    VariantFailed { video_id: VideoId, quality: QualityPreset, error: String },
    VariantSkipped { video_id: VideoId, quality: QualityPreset },

    // -- Startup recovery ----------------------------------------------------
    RecoveryStarted { videos: u64 },
    RecoveryCompleted { resumed: u64, skipped: u64, errors: u64 },
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Id assigned at emission, unique per event.
    pub id: Uuid,
    /// Wall-clock stamp applied at emission.
    pub timestamp: DateTime<Utc>,
    /// The event body.
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self { id: Uuid::new_v4(), timestamp: Utc::now(), payload }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Fan-out point for [`Event`]s, with bounded replay.
///
/// Broadcasting never blocks and never fails: with no live subscribers the
/// event still lands in the replay ring.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    ring: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Build a bus whose broadcast channel buffers `buffer` events per
    /// subscriber. Slow subscribers past that see `Lagged`, not lost pushes
    /// for everyone else. The replay ring is always [`RING_CAPACITY`] deep.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        let ring = RwLock::new(VecDeque::with_capacity(RING_CAPACITY));
        Self { sender, ring }
    }

    /// Register a live listener.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Stamp and publish a payload.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            // Newest sit at the front; truncate drops the oldest.
            let mut ring = self.ring.write();
            ring.push_front(event.clone());
            ring.truncate(RING_CAPACITY);
        }

        // A send error just means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    /// Up to `limit` retained events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        self.ring.read().iter().take(limit).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_DEPTH)
    }
}
