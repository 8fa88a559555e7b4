//! # sl-av
//!
//! Everything that touches ffmpeg and ffprobe: locating the binaries,
//! running them with timeouts, probing sources, and encoding HLS
//! renditions.
//!
//! The seam for tests is the [`Transcoder`] trait. Production wires in
//! [`FfmpegTranscoder`]; the HTTP test harness scripts its own
//! implementation.

pub mod command;
pub mod probe;
pub mod tools;
pub mod transcode;

pub use command::{ToolInvocation, ToolOutput};
pub use probe::{probe_source, SourceInfo};
pub use tools::{ResolvedTool, ToolInfo, ToolRegistry};
pub use transcode::{
    FfmpegTranscoder, Transcoder, VariantArtifacts, VariantRequest, INIT_SEGMENT,
    SEGMENT_TEMPLATE, VARIANT_PLAYLIST,
};
