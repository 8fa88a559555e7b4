//! Shared application state.
//!
//! [`ServerContext`] is handed to every route handler through Axum state.
//! Infrastructure that never changes after startup (stores, tool
//! registry, encode backend) sits behind plain `Arc`s; the runtime
//! transcode settings live in a [`LiveConfig`] that supports edit,
//! persist, and reload.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use sl_av::{ToolRegistry, Transcoder};
use sl_core::config::{Config, TranscodeConfig};
use sl_core::events::EventBus;
use sl_core::VideoId;
use sl_store::{SnapshotStore, TranscodeStatus, VideoRegistry};

use crate::cache::TtlCache;

// ---------------------------------------------------------------------------
// Live configuration
// ---------------------------------------------------------------------------

/// Runtime-editable configuration.
///
/// Only the transcode section is editable while the server runs. The
/// server, storage, and tools sections are fixed at startup, so
/// `persist` writes them back from the startup snapshot unchanged and
/// `reload` picks up only the transcode section of the file.
#[derive(Debug)]
pub struct LiveConfig {
    /// Transcoding defaults (editable via PUT /api/config/transcode).
    pub transcode: RwLock<TranscodeConfig>,
    /// Startup snapshot, so persistence writes a complete file.
    base: Config,
    /// Where to persist; None disables persistence entirely.
    path: Option<PathBuf>,
}

impl LiveConfig {
    pub fn new(config: &Config, path: Option<PathBuf>) -> Self {
        let transcode = RwLock::new(config.transcode.clone());
        Self { transcode, base: config.clone(), path }
    }

    /// Clone out the current transcode settings.
    pub fn get_transcode(&self) -> TranscodeConfig {
        self.transcode.read().clone()
    }

    /// Replace the transcode settings.
    pub fn set_transcode(&self, cfg: TranscodeConfig) {
        *self.transcode.write() = cfg;
    }

    /// Write the current configuration back to the file, best effort.
    /// Failures are logged and swallowed.
    pub fn persist(&self) {
        let Some(path) = self.path.as_ref() else { return };

        let mut snapshot = self.base.clone();
        snapshot.transcode = self.get_transcode();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("could not serialize config for persistence: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            tracing::warn!("could not persist config to {}: {e}", path.display());
        }
    }

    /// Re-read the transcode section from the file on disk.
    pub fn reload(&self) {
        let Some(path) = self.path.as_ref() else { return };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("could not read {} for reload: {e}", path.display());
                return;
            }
        };

        match Config::from_json(&text) {
            Ok(cfg) => {
                self.set_transcode(cfg.transcode);
                tracing::info!("config reloaded from {}", path.display());
            }
            Err(e) => {
                tracing::warn!("could not parse {} for reload: {e}", path.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything the handlers and the orchestrator share. Cloning is
/// cheap; each field is an `Arc`.
#[derive(Clone)]
pub struct ServerContext {
    /// Configuration as loaded at startup.
    pub config: Arc<Config>,
    /// Runtime-editable transcode settings.
    pub live_config: Arc<LiveConfig>,
    /// Job lifecycle events, fanned out to SSE clients.
    pub event_bus: Arc<EventBus>,
    /// Resolved ffmpeg/ffprobe locations.
    pub tools: Arc<ToolRegistry>,
    /// Encode backend (ffmpeg in production, scripted in tests).
    pub transcoder: Arc<dyn Transcoder>,
    /// Durable per-video job snapshots.
    pub store: Arc<SnapshotStore>,
    /// The video registry (source names and probe info).
    pub registry: Arc<VideoRegistry>,
    /// One entry per live orchestration, keyed by video. The value is the
    /// job's cooperative stop flag; entry presence is the duplicate-start
    /// guard.
    pub active_jobs: Arc<DashMap<VideoId, Arc<AtomicBool>>>,
    /// Short-TTL read-through cache over status snapshots. Owned by the
    /// query-serving layer only; the snapshot on disk stays authoritative.
    pub status_cache: Arc<TtlCache<VideoId, TranscodeStatus>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcode_settings_round_trip() {
        let store = LiveConfig::new(&Config::default(), None);
        assert_eq!(store.get_transcode().segment_seconds, 6);

        let mut cfg = store.get_transcode();
        cfg.segment_seconds = 4;
        cfg.video_preset = "fast".into();
        store.set_transcode(cfg);

        let after = store.get_transcode();
        assert_eq!(after.segment_seconds, 4);
        assert_eq!(after.video_preset, "fast");
    }

    #[test]
    fn persist_and_reload_without_a_path_are_noops() {
        let store = LiveConfig::new(&Config::default(), None);
        store.persist();
        store.reload();
    }

    #[test]
    fn reload_picks_up_persisted_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::default();
        let store = LiveConfig::new(&config, Some(path.clone()));

        let mut cfg = store.get_transcode();
        cfg.encode_timeout_secs = 1234;
        store.set_transcode(cfg);
        store.persist();

        // A fresh store starts from defaults until it reloads.
        let fresh = LiveConfig::new(&config, Some(path));
        assert_eq!(fresh.get_transcode().encode_timeout_secs, 21_600);
        fresh.reload();
        assert_eq!(fresh.get_transcode().encode_timeout_secs, 1234);
    }

    #[test]
    fn persisted_file_keeps_immutable_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.server.port = 9999;
        let store = LiveConfig::new(&config, Some(path.clone()));
        store.persist();

        let written = std::fs::read_to_string(&path).unwrap();
        let reparsed = Config::from_json(&written).unwrap();
        assert_eq!(reparsed.server.port, 9999);
    }
}
