//! Shared test rig for integration tests.
//!
//! Provides [`TestRig`], which wires a tempdir-backed media root, a
//! [`ScriptedTranscoder`] standing in for ffmpeg, and a full [`ServerContext`].
//! The [`serving`] constructor starts Axum on a random port for HTTP-level
//! testing.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tempfile::TempDir;

use sl_av::{SourceInfo, ToolRegistry, Transcoder, VariantArtifacts, VariantRequest};
use sl_core::config::Config;
use sl_core::events::EventBus;
use sl_core::{QualityPreset, VideoId};
use sl_server::cache::TtlCache;
use sl_server::context::{LiveConfig, ServerContext};
use sl_server::router::build_router;
use sl_store::{JobState, SnapshotStore, TranscodeStatus, VideoRegistry};

// ---------------------------------------------------------------------------
// ScriptedTranscoder
// ---------------------------------------------------------------------------

/// A [`Transcoder`] that succeeds, fails, or trips the stop flag on cue
/// instead of invoking ffmpeg.
pub struct ScriptedTranscoder {
    /// Source info returned by `probe`.
    source_info: Mutex<SourceInfo>,
    /// When set, `probe` fails with this message.
    probe_error: Mutex<Option<String>>,
    /// Presets that fail with the given message.
    failures: Mutex<HashMap<QualityPreset, String>>,
    /// Encode invocations per preset, for re-encode assertions.
    encode_calls: Mutex<HashMap<QualityPreset, u32>>,
    /// While encoding this preset, set the job's stop flag (simulates a stop
    /// request landing mid-rendition).
    stop_cue: Mutex<Option<QualityPreset>>,
    /// Live job flags, shared with the context.
    active_jobs: Arc<DashMap<VideoId, Arc<AtomicBool>>>,
}

impl ScriptedTranscoder {
    fn new(active_jobs: Arc<DashMap<VideoId, Arc<AtomicBool>>>) -> Self {
        Self {
            source_info: Mutex::new(SourceInfo {
                width: 1920,
                height: 1080,
                duration_secs: Some(60.0),
                frame_rate: Some(24.0),
                video_codec: Some("h264".into()),
                audio_codec: Some("aac".into()),
                file_size: 1_000_000,
            }),
            probe_error: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
            encode_calls: Mutex::new(HashMap::new()),
            stop_cue: Mutex::new(None),
            active_jobs,
        }
    }

    /// Change the resolution that `probe` reports.
    pub fn set_source_resolution(&self, width: u32, height: u32) {
        let mut info = self.source_info.lock();
        info.width = width;
        info.height = height;
    }

    /// Make `probe` fail with the given message.
    pub fn set_probe_error(&self, message: &str) {
        *self.probe_error.lock() = Some(message.to_string());
    }

    /// Make encodes of `preset` fail with the given message.
    pub fn fail_preset(&self, preset: QualityPreset, message: &str) {
        self.failures.lock().insert(preset, message.to_string());
    }

    /// Stop failing encodes of `preset`.
    pub fn clear_failure(&self, preset: QualityPreset) {
        self.failures.lock().remove(&preset);
    }

    /// Trip the job's stop flag while encoding `preset`, so the worker halts
    /// at the next quality boundary.
    pub fn stop_during(&self, preset: QualityPreset) {
        *self.stop_cue.lock() = Some(preset);
    }

    /// Cancel a pending [`stop_during`](Self::stop_during) cue.
    pub fn clear_stop_cue(&self) {
        *self.stop_cue.lock() = None;
    }

    /// Number of times `preset` was actually encoded.
    pub fn calls(&self, preset: QualityPreset) -> u32 {
        self.encode_calls.lock().get(&preset).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn probe(
        &self,
        _source: &Path,
        _timeout: Option<Duration>,
    ) -> sl_core::Result<SourceInfo> {
        if let Some(message) = self.probe_error.lock().clone() {
            return Err(sl_core::Error::Probe(message));
        }
        Ok(self.source_info.lock().clone())
    }

    async fn encode_variant(&self, request: &VariantRequest) -> sl_core::Result<VariantArtifacts> {
        *self.encode_calls.lock().entry(request.preset).or_insert(0) += 1;

        // The video id is the name of the video folder.
        if *self.stop_cue.lock() == Some(request.preset) {
            let name = request.video_dir.file_name().and_then(|n| n.to_str());
            if let Some(id) = name.and_then(|s| s.parse::<VideoId>().ok()) {
                if let Some(flag) = self.active_jobs.get(&id) {
                    flag.store(true, Ordering::Relaxed);
                }
            }
        }

        if let Some(message) = self.failures.lock().get(&request.preset).cloned() {
            return Err(sl_core::Error::Tool { tool: "ffmpeg".into(), message });
        }

        let variant_dir = request.variant_dir();
        std::fs::create_dir_all(&variant_dir)?;
        std::fs::write(variant_dir.join("index.m3u8"), b"#EXTM3U\n#EXT-X-ENDLIST\n")?;

        Ok(VariantArtifacts { playlist: request.playlist_rel() })
    }
}

// ---------------------------------------------------------------------------
// TestRig
// ---------------------------------------------------------------------------

/// Test rig wrapping a fully-constructed [`ServerContext`] backed by a
/// temporary media root and a scripted transcoder.
pub struct TestRig {
    pub ctx: ServerContext,
    pub transcoder: Arc<ScriptedTranscoder>,
    /// Keeps the media root alive for the rig lifetime.
    _media_root: TempDir,
}

impl TestRig {
    /// A rig with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// A rig with a custom configuration. The media root is always
    /// redirected into a tempdir.
    pub fn with_config(mut config: Config) -> Self {
        let media_root = TempDir::new().expect("tempdir for media root");
        config.storage.media_root = media_root.path().to_path_buf();

        let active_jobs: Arc<DashMap<VideoId, Arc<AtomicBool>>> = Arc::new(DashMap::new());
        let transcoder = Arc::new(ScriptedTranscoder::new(Arc::clone(&active_jobs)));
        let registry = VideoRegistry::open(media_root.path()).expect("registry should open");

        Self {
            ctx: ServerContext {
                tools: Arc::new(ToolRegistry::discover(&config.tools)),
                live_config: Arc::new(LiveConfig::new(&config, None)),
                event_bus: Arc::new(EventBus::default()),
                transcoder: transcoder.clone(),
                store: Arc::new(SnapshotStore::new(media_root.path())),
                registry: Arc::new(registry),
                active_jobs,
                status_cache: Arc::new(TtlCache::new(Duration::from_millis(50))),
                config: Arc::new(config),
            },
            transcoder,
            _media_root: media_root,
        }
    }

    /// Start an Axum server on a random port and return the rig together
    /// with the bound socket address.
    pub async fn serving() -> (Self, SocketAddr) {
        let rig = Self::new();
        let app = build_router(rig.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("port bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.ok() });

        (rig, addr)
    }

    /// Register a video and drop a placeholder source file in its folder.
    pub fn register_source(&self, name: &str) -> VideoId {
        let entry = self.ctx.registry.register(None, name).expect("register video");
        let dir = self.ctx.store.video_dir(entry.video_id);
        std::fs::create_dir_all(&dir).expect("create video dir");
        std::fs::write(dir.join(name), b"not really a video").expect("write source file");
        entry.video_id
    }

    /// Poll until the snapshot reaches `state`, or panic after ~2 seconds.
    pub async fn wait_for_state(&self, id: VideoId, state: JobState) -> TranscodeStatus {
        for _ in 0..100 {
            if let Ok(Some(status)) = self.ctx.store.load(id).await {
                if status.state == state {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("video {id} never reached {state}");
    }

    /// Poll until no worker owns the video, or panic after ~2 seconds. The
    /// terminal snapshot write lands just before the worker releases its
    /// claim, so restart-shaped tests wait for both.
    pub async fn wait_idle(&self, id: VideoId) {
        for _ in 0..100 {
            if !self.ctx.active_jobs.contains_key(&id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("video {id} never released its worker claim");
    }
}
