//! HLS variant encoding via ffmpeg.
//!
//! Each rung of the quality ladder is produced by a single ffmpeg invocation
//! that scales (never upscales), encodes H.264/AAC at the rung's bitrates,
//! and writes a self-contained fMP4 HLS rendition into the variant folder:
//! `<video_dir>/<quality>/index.m3u8` plus `init.mp4` and `seg%04d.m4s`
//! segments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sl_core::QualityPreset;

use crate::command::ToolInvocation;
use crate::probe::{probe_source, SourceInfo};
use crate::tools::ToolRegistry;

/// Media playlist file name inside each variant folder.
pub const VARIANT_PLAYLIST: &str = "index.m3u8";
/// fMP4 initialization segment file name.
pub const INIT_SEGMENT: &str = "init.mp4";
/// printf-style template for media segment file names.
pub const SEGMENT_TEMPLATE: &str = "seg%04d.m4s";

/// Stand-in for a disabled timeout. tokio's timer cannot represent
/// `Duration::MAX`, so "disabled" is a year.
const NO_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Requests and artifacts
// ---------------------------------------------------------------------------

/// Everything a single variant encode needs to know.
#[derive(Debug, Clone)]
pub struct VariantRequest {
    /// Path to the assembled source file.
    pub source: PathBuf,
    /// Per-video folder that the variant folder lives in.
    pub video_dir: PathBuf,
    /// Which rung of the ladder to produce.
    pub preset: QualityPreset,
    /// HLS segment duration in seconds.
    pub segment_seconds: u32,
    /// x264 speed preset for software encodes.
    pub video_preset: String,
    /// Hardware acceleration method (none, videotoolbox, nvenc, vaapi, qsv).
    pub hw_accel: Option<String>,
    /// Hard ceiling for the encode; `None` disables the timeout.
    pub encode_timeout: Option<Duration>,
}

impl VariantRequest {
    /// Folder the variant's playlist and segments are written to.
    pub fn variant_dir(&self) -> PathBuf {
        self.video_dir.join(self.preset.label())
    }

    /// Playlist path relative to the video folder (e.g. `720p/index.m3u8`).
    /// This is the form stored in the status snapshot and referenced by the
    /// master playlist.
    pub fn playlist_rel(&self) -> String {
        format!("{}/{}", self.preset.label(), VARIANT_PLAYLIST)
    }
}

/// Artifacts produced by a successful variant encode.
#[derive(Debug, Clone)]
pub struct VariantArtifacts {
    /// Playlist path relative to the video folder.
    pub playlist: String,
}

// ---------------------------------------------------------------------------
// Transcoder trait
// ---------------------------------------------------------------------------

/// Abstraction over the encode backend.
///
/// The orchestrator only ever talks to this trait, so tests can swap in a
/// scripted implementation and exercise the full job lifecycle without
/// ffmpeg installed.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Inspect a source file.
    async fn probe(&self, source: &Path, timeout: Option<Duration>) -> sl_core::Result<SourceInfo>;

    /// Produce one quality variant of a source in its HLS folder, returning
    /// the playlist path relative to the video folder.
    async fn encode_variant(&self, request: &VariantRequest) -> sl_core::Result<VariantArtifacts>;
}

// ---------------------------------------------------------------------------
// FfmpegTranscoder
// ---------------------------------------------------------------------------

/// The production [`Transcoder`] backed by the ffmpeg and ffprobe CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    tools: ToolRegistry,
}

impl FfmpegTranscoder {
    /// Create a transcoder over the given tool registry.
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, source: &Path, timeout: Option<Duration>) -> sl_core::Result<SourceInfo> {
        probe_source(&self.tools, source, timeout.unwrap_or(NO_TIMEOUT)).await
    }

    async fn encode_variant(&self, request: &VariantRequest) -> sl_core::Result<VariantArtifacts> {
        let ffmpeg = self.tools.require("ffmpeg")?;

        let variant_dir = request.variant_dir();
        let playlist_path = variant_dir.join(VARIANT_PLAYLIST);

        // Recreate the variant folder so stale segments from an earlier
        // attempt can never outlive the playlist that referenced them.
        if tokio::fs::try_exists(&variant_dir).await? {
            tokio::fs::remove_dir_all(&variant_dir).await?;
        }
        tokio::fs::create_dir_all(&variant_dir).await?;

        let plan = encode_plan(request.hw_accel.as_deref());
        tracing::info!(
            "HLS variant encode: {:?} -> {:?} (quality={}, encoder={}, preset={}, hw_accel={:?})",
            request.source,
            playlist_path,
            request.preset,
            plan.encoder,
            request.video_preset,
            request.hw_accel,
        );

        let mut cmd = ToolInvocation::new(ffmpeg.path.clone());
        cmd.timeout(request.encode_timeout.unwrap_or(NO_TIMEOUT));
        cmd.args(encode_args(request));
        cmd.execute().await?;

        // ffmpeg can exit zero without writing a playlist (e.g. when it was
        // fed an empty input); treat that as a tool failure.
        match tokio::fs::metadata(&playlist_path).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                return Err(sl_core::Error::Tool {
                    tool: "ffmpeg".into(),
                    message: format!(
                        "exited successfully but wrote an empty playlist at {}",
                        playlist_path.display()
                    ),
                });
            }
            Err(_) => {
                return Err(sl_core::Error::Tool {
                    tool: "ffmpeg".into(),
                    message: format!(
                        "exited successfully but wrote no playlist at {}",
                        playlist_path.display()
                    ),
                });
            }
        }

        Ok(VariantArtifacts { playlist: request.playlist_rel() })
    }
}

// ---------------------------------------------------------------------------
// ffmpeg argument assembly
// ---------------------------------------------------------------------------

/// Encoder used when no hardware method applies. This is also the only
/// encoder that understands x264 speed presets.
const SOFTWARE_ENCODER: &str = "libx264";

/// Supported acceleration methods as `(method, hwaccel flags, encoder)` rows.
const HW_METHODS: &[(&str, &[&str], &str)] = &[
    ("videotoolbox", &["-hwaccel", "videotoolbox"], "h264_videotoolbox"),
    ("nvenc", &["-hwaccel", "cuda"], "h264_nvenc"),
    ("vaapi", &["-hwaccel", "vaapi", "-hwaccel_output_format", "vaapi"], "h264_vaapi"),
    ("qsv", &["-hwaccel", "qsv"], "h264_qsv"),
];

/// How the video stream of one variant gets encoded.
struct EncodePlan {
    /// Decoder-side flags ffmpeg only honors ahead of `-i`.
    hw_flags: &'static [&'static str],
    /// Value for `-c:v`.
    encoder: &'static str,
}

impl EncodePlan {
    fn is_software(&self) -> bool {
        self.encoder == SOFTWARE_ENCODER
    }
}

/// Look up the encode plan for a configured acceleration method. Absent,
/// `none`, and unrecognized methods all land on software x264; config
/// validation already warned about the unrecognized ones.
fn encode_plan(method: Option<&str>) -> EncodePlan {
    let wanted = method.unwrap_or("none");
    for &(name, hw_flags, encoder) in HW_METHODS {
        if name == wanted {
            return EncodePlan { hw_flags, encoder };
        }
    }
    EncodePlan { hw_flags: &[], encoder: SOFTWARE_ENCODER }
}

/// Build the full ffmpeg argument list for one variant encode.
///
/// The scale filter clamps to the rung's frame size without ever upscaling
/// and keeps dimensions even for H.264. Keyframes are forced every two
/// seconds so segment boundaries land on them.
fn encode_args(request: &VariantRequest) -> Vec<String> {
    let preset = request.preset;
    let variant_dir = request.variant_dir();
    let plan = encode_plan(request.hw_accel.as_deref());

    let mut args: Vec<String> = vec!["-y".into()];

    // Decoder flags go ahead of the input they apply to.
    args.extend(plan.hw_flags.iter().map(|s| s.to_string()));

    args.push("-i".into());
    args.push(request.source.to_string_lossy().into_owned());

    args.extend(["-c:v".into(), plan.encoder.to_string()]);
    args.extend(["-profile:v".into(), "high".into()]);
    if plan.is_software() {
        args.extend(["-preset".into(), request.video_preset.clone()]);
    }

    args.extend(["-b:v".into(), preset.video_bitrate().to_string()]);
    args.extend(["-maxrate".into(), preset.peak_video_bitrate().to_string()]);
    args.extend(["-bufsize".into(), (preset.peak_video_bitrate() * 2).to_string()]);

    let scale = format!(
        "scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2",
        w = preset.width(),
        h = preset.height(),
    );
    args.extend(["-vf".into(), scale]);
    args.extend(["-force_key_frames".into(), "expr:gte(t,n_forced*2)".into()]);

    args.extend(["-c:a".into(), "aac".into()]);
    args.extend(["-b:a".into(), preset.audio_bitrate().to_string()]);
    args.extend(["-ac".into(), "2".into()]);

    // The trailing `?` keeps audio mapping optional for silent sources.
    args.extend(["-map".into(), "0:v:0".into()]);
    args.extend(["-map".into(), "0:a:0?".into()]);

    args.extend(["-f".into(), "hls".into()]);
    args.extend(["-hls_time".into(), request.segment_seconds.to_string()]);
    args.extend(["-hls_playlist_type".into(), "vod".into()]);
    args.extend(["-hls_segment_type".into(), "fmp4".into()]);
    // ffmpeg resolves the init filename against the playlist's folder.
    args.extend(["-hls_fmp4_init_filename".into(), INIT_SEGMENT.into()]);
    let segments = variant_dir.join(SEGMENT_TEMPLATE);
    args.extend(["-hls_segment_filename".into(), segments.to_string_lossy().into_owned()]);

    args.push(variant_dir.join(VARIANT_PLAYLIST).to_string_lossy().into_owned());

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(preset: QualityPreset, hw_accel: Option<&str>) -> VariantRequest {
        VariantRequest {
            source: PathBuf::from("/media/v1/source.mp4"),
            video_dir: PathBuf::from("/media/v1"),
            preset,
            segment_seconds: 6,
            video_preset: "veryfast".into(),
            hw_accel: hw_accel.map(str::to_string),
            encode_timeout: Some(Duration::from_secs(3600)),
        }
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn each_hw_method_picks_its_encoder() {
        let expectations = [
            ("videotoolbox", "h264_videotoolbox", "videotoolbox"),
            ("nvenc", "h264_nvenc", "cuda"),
            ("vaapi", "h264_vaapi", "vaapi"),
            ("qsv", "h264_qsv", "qsv"),
        ];
        for (method, encoder, hwaccel) in expectations {
            let plan = encode_plan(Some(method));
            assert_eq!(plan.encoder, encoder);
            assert_eq!(plan.hw_flags[..2], ["-hwaccel", hwaccel]);
            assert!(!plan.is_software());
        }
    }

    #[test]
    fn vaapi_pins_its_output_format() {
        let plan = encode_plan(Some("vaapi"));
        assert_eq!(plan.hw_flags, ["-hwaccel", "vaapi", "-hwaccel_output_format", "vaapi"]);
    }

    #[test]
    fn absent_and_unrecognized_methods_encode_in_software() {
        for method in [None, Some("none"), Some("quicksync3000")] {
            let plan = encode_plan(method);
            assert!(plan.hw_flags.is_empty());
            assert_eq!(plan.encoder, "libx264");
            assert!(plan.is_software());
        }
    }

    #[test]
    fn software_encode_args_720p() {
        let args = encode_args(&request(QualityPreset::P720, None));

        assert_eq!(args[0], "-y");
        assert!(has_pair(&args, "-i", "/media/v1/source.mp4"));
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-preset", "veryfast"));
        assert!(has_pair(&args, "-b:v", "2800000"));
        assert!(has_pair(&args, "-maxrate", "2996000"));
        assert!(has_pair(&args, "-bufsize", "5992000"));
        assert!(has_pair(&args, "-b:a", "128000"));
        assert!(has_pair(&args, "-hls_time", "6"));
        assert!(has_pair(&args, "-hls_playlist_type", "vod"));
        assert!(has_pair(&args, "-hls_segment_type", "fmp4"));
        assert!(has_pair(&args, "-hls_fmp4_init_filename", "init.mp4"));
        assert!(has_pair(&args, "-hls_segment_filename", "/media/v1/720p/seg%04d.m4s"));
        assert_eq!(args.last().unwrap(), "/media/v1/720p/index.m3u8");
    }

    #[test]
    fn scale_filter_never_upscales() {
        let args = encode_args(&request(QualityPreset::P480, None));
        let vf = args.windows(2).find(|w| w[0] == "-vf").map(|w| w[1].clone()).unwrap();
        assert!(vf.contains("min(854,iw)"));
        assert!(vf.contains("min(480,ih)"));
        assert!(vf.contains("force_original_aspect_ratio=decrease"));
        assert!(vf.contains("force_divisible_by=2"));
    }

    #[test]
    fn audio_mapping_is_optional() {
        let args = encode_args(&request(QualityPreset::P360, None));
        assert!(has_pair(&args, "-map", "0:v:0"));
        assert!(has_pair(&args, "-map", "0:a:0?"));
    }

    #[test]
    fn hardware_encode_skips_x264_preset() {
        let args = encode_args(&request(QualityPreset::P1080, Some("nvenc")));
        assert!(has_pair(&args, "-c:v", "h264_nvenc"));
        assert!(!has_pair(&args, "-preset", "veryfast"));
        // decoder flags land ahead of -i
        let hw = args.iter().position(|a| a == "-hwaccel").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(hw < input);
    }

    #[test]
    fn playlist_rel_uses_quality_label() {
        let req = request(QualityPreset::P1080, None);
        assert_eq!(req.playlist_rel(), "1080p/index.m3u8");
        assert_eq!(req.variant_dir(), PathBuf::from("/media/v1/1080p"));
    }
}
