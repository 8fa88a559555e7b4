//! Application configuration.
//!
//! One JSON file, four sections: `server`, `storage`, `tools`, `transcode`.
//! Every field has a default, so `{}` (or no file at all) yields a working
//! configuration. Parsing is strict about types but silent about unknown
//! keys, which keeps old config files valid across upgrades.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hardware acceleration methods [`Config::validate`] recognizes.
const HW_ACCEL_METHODS: &[&str] = &["none", "videotoolbox", "nvenc", "vaapi", "qsv"];

// ---------------------------------------------------------------------------
// Config root
// ---------------------------------------------------------------------------

/// The full configuration tree as read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Parse a `Config` from a JSON string.
    ///
    /// String-based so the caller decides how the bytes arrive (sync read,
    /// async read, embedded test fixture).
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Validation(format!("bad config: {e}")))
    }

    /// Load a config file, or fall back to defaults.
    ///
    /// A missing path, missing file, unreadable file, or unparseable file all
    /// produce the default config; only the log level distinguishes "no file"
    /// from "broken file". The server must come up either way.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else { return Self::default() };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("no config at {}; running on defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("config {} unreadable ({e}); running on defaults", path.display());
                return Self::default();
            }
        };

        Self::from_json(&contents).unwrap_or_else(|e| {
            tracing::warn!("config {} rejected ({e}); running on defaults", path.display());
            Self::default()
        })
    }

    /// Non-fatal findings worth telling the operator about.
    pub fn validate(&self) -> Vec<String> {
        let mut findings = Vec::new();

        if self.server.port == 0 {
            findings.push("server.port is 0; the OS will pick an arbitrary port".into());
        }
        if self.storage.media_root.as_os_str().is_empty() {
            findings.push("storage.media_root is empty".into());
        }
        if self.transcode.segment_seconds == 0 {
            let msg = "transcode.segment_seconds is 0; ffmpeg will pick its own segmentation";
            findings.push(msg.into());
        }
        if self.transcode.encode_timeout_secs == 0 {
            findings.push("transcode.encode_timeout_secs is 0; encodes never time out".into());
        }
        if let Some(hw) = self.transcode.hw_accel.as_deref() {
            if !HW_ACCEL_METHODS.contains(&hw) {
                findings.push(format!(
                    "transcode.hw_accel '{hw}' is not a recognized method (valid: {})",
                    HW_ACCEL_METHODS.join(", ")
                ));
            }
        }

        findings
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where the HTTP listener binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind. Defaults to all interfaces.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 8080 }
    }
}

/// On-disk media layout settings.
///
/// `media_root` holds one folder per video, named by its id. Inside live the
/// uploaded source, the status snapshot, one folder per encoded quality, and
/// the master playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub media_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("./data/videos"),
        }
    }
}

/// Explicit paths to external CLI tools, overriding `PATH` lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Where to find ffmpeg; `None` means search `PATH`.
    pub ffmpeg_path: Option<PathBuf>,
    /// Where to find ffprobe; `None` means search `PATH`.
    pub ffprobe_path: Option<PathBuf>,
}

/// Encoding knobs, reloadable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// HLS segment duration in seconds.
    pub segment_seconds: u32,
    /// x264 speed preset used for software encodes.
    pub video_preset: String,
    /// Hardware encoder selection; `HW_ACCEL_METHODS` lists accepted
    /// values. A supported value swaps libx264 for the matching
    /// hardware encoder.
    pub hw_accel: Option<String>,
    /// Hard ceiling for a single variant encode, in seconds. 0 disables the
    /// timeout entirely.
    pub encode_timeout_secs: u64,
    /// Ceiling for a single ffprobe run, in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 6,
            video_preset: "veryfast".into(),
            // Six hours: generous for a feature-length encode, finite so a
            // hung encoder cannot hold the job claim forever.
            encode_timeout_secs: 21_600,
            probe_timeout_secs: 60,
            hw_accel: None,
        }
    }
}
