//! Source inspection via `ffprobe`.
//!
//! Runs `ffprobe -v quiet -print_format json -show_format -show_streams`
//! against the source and maps the JSON into a [`SourceInfo`]. The pipeline
//! only needs the dimensions of the first video stream to size the quality
//! ladder, but the remaining fields are cheap to carry and useful in logs and
//! CLI output.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolInvocation;
use crate::tools::ToolRegistry;

/// Facts about a source video, extracted by ffprobe.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    /// Width of the first video stream, in pixels.
    pub width: u32,
    /// Height of the first video stream, in pixels.
    pub height: u32,
    /// Container duration in seconds, if reported.
    pub duration_secs: Option<f64>,
    /// Frame rate of the video stream, if reported.
    pub frame_rate: Option<f64>,
    /// Codec name of the video stream (e.g. "h264").
    pub video_codec: Option<String>,
    /// Codec name of the first audio stream, if any.
    pub audio_codec: Option<String>,
    /// File size in bytes as reported by the container.
    pub file_size: u64,
}

/// Probe a source file with ffprobe.
///
/// # Errors
///
/// - [`sl_core::Error::Tool`] if ffprobe is missing, fails, or times out.
/// - [`sl_core::Error::Probe`] if the output cannot be parsed or the file has
///   no usable video stream.
pub async fn probe_source(
    tools: &ToolRegistry,
    path: &Path,
    timeout: Duration,
) -> sl_core::Result<SourceInfo> {
    let ffprobe = tools.require("ffprobe")?;

    let mut cmd = ToolInvocation::new(ffprobe.path.clone());
    cmd.timeout(timeout);
    cmd.args([
        "-v", "quiet",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(path.to_string_lossy().as_ref());

    let output = cmd.execute().await?;
    let doc: ProbeDoc = serde_json::from_str(&output.stdout)
        .map_err(|e| sl_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    interpret(path, doc)
}

// ---------------------------------------------------------------------------
// ffprobe JSON mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProbeDoc {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

// ffprobe emits numbers as strings in places, so several fields stay String
// here and parse later.
#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    r_frame_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

fn interpret(path: &Path, doc: ProbeDoc) -> sl_core::Result<SourceInfo> {
    let video = doc
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            sl_core::Error::Probe(format!("no video stream found in {}", path.display()))
        })?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(sl_core::Error::Probe(format!(
                "video stream in {} has no usable dimensions",
                path.display()
            )))
        }
    };

    let audio = doc.streams.iter().find(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(SourceInfo {
        width,
        height,
        duration_secs: doc.format.duration.as_deref().and_then(|s| s.parse().ok()),
        frame_rate: video.r_frame_rate.as_deref().and_then(parse_frame_rate),
        video_codec: video.codec_name.clone(),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        file_size: doc.format.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
    })
}

/// ffprobe reports rates as fractions ("24000/1001"), occasionally bare.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then_some(num / den)
        }
        None => raw.parse().ok(),
    }
}
