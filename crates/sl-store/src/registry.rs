//! Registry of uploaded videos.
//!
//! The upload collaborator registers `(video_id, source_name)` pairs here
//! once chunked assembly has placed the source file in the video folder.
//! After probing, the pipeline writes the original resolution and derived
//! quality label back so external readers can display them. One JSON file
//! under the media root, written with the same atomic discipline as the
//! snapshots.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sl_core::{Error, QualityPreset, Result, VideoId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::snapshot::atomic_write;

/// Registry file name under the media root.
pub const REGISTRY_FILE: &str = "registry.json";

/// File names the upload collaborator may not claim for a source.
const RESERVED_NAMES: [&str; 3] = ["status.json", "master.m3u8", "registry.json"];

/// One registered video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub video_id: VideoId,
    /// Bare file name of the assembled source inside the video folder.
    pub source_name: String,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    /// Nearest preset label at or below the source height, or `"original"`.
    pub original_quality: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// In-memory view of the registry file, persisted on every mutation.
#[derive(Debug)]
pub struct VideoRegistry {
    path: PathBuf,
    entries: RwLock<BTreeMap<VideoId, RegistryEntry>>,
}

impl VideoRegistry {
    /// Open the registry under `media_root`. A missing file yields an empty
    /// registry; a file that exists but does not parse is corruption and
    /// surfaces as a Store error.
    pub fn open(media_root: &Path) -> Result<Self> {
        let path = media_root.join(REGISTRY_FILE);
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                Error::store(format!("corrupt registry {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Register an uploaded video, minting a fresh id when none is supplied.
    /// Re-registering an existing id updates its source name and keeps any
    /// probe results.
    pub fn register(&self, id: Option<VideoId>, source_name: &str) -> Result<RegistryEntry> {
        validate_source_name(source_name)?;
        let id = id.unwrap_or_default();

        let mut entries = self.entries.write();
        let entry = entries
            .entry(id)
            .and_modify(|e| e.source_name = source_name.to_string())
            .or_insert_with(|| RegistryEntry {
                video_id: id,
                source_name: source_name.to_string(),
                original_width: None,
                original_height: None,
                original_quality: None,
                registered_at: Utc::now(),
            })
            .clone();
        self.persist(&entries)?;
        Ok(entry)
    }

    /// Look up one entry.
    pub fn get(&self, id: VideoId) -> Option<RegistryEntry> {
        self.entries.read().get(&id).cloned()
    }

    /// All entries, ordered by video id.
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Write probe results back onto a registered video.
    pub fn set_probe_info(
        &self,
        id: VideoId,
        width: u32,
        height: u32,
        quality_label: &str,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("video", id))?;
        entry.original_width = Some(width);
        entry.original_height = Some(height);
        entry.original_quality = Some(quality_label.to_string());
        self.persist(&entries)
    }

    fn persist(&self, entries: &BTreeMap<VideoId, RegistryEntry>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::store(format!("serialize registry: {e}")))?;
        atomic_write(&self.path, json.as_bytes())
    }
}

fn validate_source_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("source_name is required".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::Validation(
            "source_name must be a bare file name".into(),
        ));
    }
    if RESERVED_NAMES.contains(&name)
        || QualityPreset::all().iter().any(|p| p.label() == name)
    {
        return Err(Error::Validation(format!(
            "source_name '{name}' is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, VideoRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = VideoRegistry::open(tmp.path()).unwrap();
        (tmp, registry)
    }

    #[test]
    fn register_mints_an_id() {
        let (_tmp, registry) = registry();
        let entry = registry.register(None, "lecture.mp4").unwrap();
        assert_eq!(entry.source_name, "lecture.mp4");
        assert_eq!(registry.get(entry.video_id).unwrap(), entry);
    }

    #[test]
    fn register_with_supplied_id() {
        let (_tmp, registry) = registry();
        let id = VideoId::new();
        let entry = registry.register(Some(id), "intro.mov").unwrap();
        assert_eq!(entry.video_id, id);
    }

    #[test]
    fn reregister_updates_source_and_keeps_probe_info() {
        let (_tmp, registry) = registry();
        let id = registry.register(None, "v1.mp4").unwrap().video_id;
        registry.set_probe_info(id, 1280, 720, "720p").unwrap();

        registry.register(Some(id), "v2.mp4").unwrap();
        let entry = registry.get(id).unwrap();
        assert_eq!(entry.source_name, "v2.mp4");
        assert_eq!(entry.original_height, Some(720));
        assert_eq!(entry.original_quality.as_deref(), Some("720p"));
    }

    #[test]
    fn rejects_empty_and_path_like_names() {
        let (_tmp, registry) = registry();
        for bad in ["", "a/b.mp4", "..\\evil.mp4", "../up.mp4"] {
            let err = registry.register(None, bad).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad:?}: {err}");
        }
    }

    #[test]
    fn rejects_reserved_names() {
        let (_tmp, registry) = registry();
        for bad in ["status.json", "master.m3u8", "registry.json", "720p"] {
            let err = registry.register(None, bad).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad:?}: {err}");
        }
    }

    #[test]
    fn probe_info_persists_across_reopen() {
        let (tmp, registry) = registry();
        let id = registry.register(None, "talk.mp4").unwrap().video_id;
        registry.set_probe_info(id, 3840, 2160, "1080p").unwrap();
        drop(registry);

        let reopened = VideoRegistry::open(tmp.path()).unwrap();
        let entry = reopened.get(id).unwrap();
        assert_eq!(entry.original_width, Some(3840));
        assert_eq!(entry.original_quality.as_deref(), Some("1080p"));
    }

    #[test]
    fn probe_info_for_unknown_video_is_not_found() {
        let (_tmp, registry) = registry();
        let err = registry
            .set_probe_info(VideoId::new(), 100, 100, "original")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn corrupt_registry_is_store_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(REGISTRY_FILE), b"[1, 2,").unwrap();
        let err = VideoRegistry::open(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let (_tmp, registry) = registry();
        assert!(registry.list().is_empty());
    }
}
