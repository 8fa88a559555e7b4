//! HLS master playlist generation.

use std::fmt::Write;

use sl_core::QualityPreset;

use crate::types::{MasterPlaylist, Variant};

/// Master playlist file name inside each video folder.
pub const MASTER_FILE: &str = "master.m3u8";

/// Build a [`MasterPlaylist`] from succeeded ladder rungs and their media
/// playlist URIs.
///
/// Variants are ordered highest resolution first regardless of input order,
/// so the same set of rungs always renders the same playlist.
pub fn master_for_variants(variants: &[(QualityPreset, String)]) -> MasterPlaylist {
    let mut entries: Vec<(QualityPreset, String)> = variants.to_vec();
    entries.sort_by_key(|(preset, _)| *preset);

    MasterPlaylist {
        variants: entries
            .into_iter()
            .map(|(preset, uri)| Variant::from_preset(preset, uri))
            .collect(),
    }
}

/// Render a [`MasterPlaylist`] as M3U8 text.
///
/// Output is the `#EXTM3U` header followed by one `#EXT-X-STREAM-INF`
/// tag plus URI line per variant.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    // Writing into a String cannot fail, hence the unwraps.
    let mut out = String::from("#EXTM3U\n");

    for variant in &playlist.variants {
        let (w, h) = variant.resolution;
        write!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},AVERAGE-BANDWIDTH={},RESOLUTION={w}x{h}",
            variant.bandwidth, variant.average_bandwidth
        )
        .unwrap();
        if !variant.codecs.is_empty() {
            write!(out, ",CODECS=\"{}\"", variant.codecs).unwrap();
        }
        out.push('\n');
        writeln!(out, "{}", variant.uri).unwrap();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_playlist_basic() {
        let playlist = master_for_variants(&[
            (QualityPreset::P1080, "1080p/index.m3u8".to_string()),
            (QualityPreset::P720, "720p/index.m3u8".to_string()),
        ]);

        let rendered = generate_master_playlist(&playlist);

        assert!(rendered.starts_with("#EXTM3U\n"));
        assert!(rendered.contains("BANDWIDTH=5542000"));
        assert!(rendered.contains("AVERAGE-BANDWIDTH=5192000"));
        assert!(rendered.contains("RESOLUTION=1920x1080"));
        assert!(rendered.contains("CODECS=\"avc1.640028,mp4a.40.2\""));
        assert!(rendered.contains("1080p/index.m3u8"));
        assert!(rendered.contains("BANDWIDTH=3124000"));
        assert!(rendered.contains("720p/index.m3u8"));
    }

    #[test]
    fn master_playlist_empty() {
        let playlist = MasterPlaylist { variants: vec![] };

        assert_eq!(generate_master_playlist(&playlist), "#EXTM3U\n");
    }

    #[test]
    fn variants_sorted_highest_first() {
        let playlist = master_for_variants(&[
            (QualityPreset::P360, "360p/index.m3u8".to_string()),
            (QualityPreset::P1080, "1080p/index.m3u8".to_string()),
            (QualityPreset::P480, "480p/index.m3u8".to_string()),
        ]);

        let heights: Vec<u32> = playlist.variants.iter().map(|v| v.resolution.1).collect();
        assert_eq!(heights, vec![1080, 480, 360]);
    }

    #[test]
    fn composition_is_deterministic() {
        let a = master_for_variants(&[
            (QualityPreset::P720, "720p/index.m3u8".to_string()),
            (QualityPreset::P360, "360p/index.m3u8".to_string()),
        ]);
        let b = master_for_variants(&[
            (QualityPreset::P360, "360p/index.m3u8".to_string()),
            (QualityPreset::P720, "720p/index.m3u8".to_string()),
        ]);

        assert_eq!(generate_master_playlist(&a), generate_master_playlist(&b));
    }

    #[test]
    fn master_playlist_format_exact() {
        let playlist =
            master_for_variants(&[(QualityPreset::P720, "720p/index.m3u8".to_string())]);

        let expected = "\
#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=3124000,AVERAGE-BANDWIDTH=2928000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\"
720p/index.m3u8
";
        assert_eq!(generate_master_playlist(&playlist), expected);
    }

    #[test]
    fn single_variant_for_small_source() {
        let playlist =
            master_for_variants(&[(QualityPreset::P360, "360p/index.m3u8".to_string())]);

        let rendered = generate_master_playlist(&playlist);
        assert!(rendered.contains("RESOLUTION=640x360"));
        assert!(rendered.contains("BANDWIDTH=952000"));
        assert!(rendered.contains("AVERAGE-BANDWIDTH=896000"));
        assert!(rendered.ends_with("360p/index.m3u8\n"));
    }
}
