//! Atomic, per-video persistence for [`TranscodeStatus`] snapshots.
//!
//! Each video folder holds one `status.json`. Writes go through a temporary
//! file in the same directory followed by a rename, so concurrent readers
//! observe either the previous snapshot or the new one, never a torn file.
//! Read-modify-write cycles serialize through a per-video async lock.

use dashmap::DashMap;
use sl_core::{Error, Result, VideoId};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::model::{TranscodeStatus, VariantRecord};

/// Snapshot file name inside each video folder.
pub const SNAPSHOT_FILE: &str = "status.json";

/// Attempts before a snapshot write is declared failed.
const SAVE_ATTEMPTS: u32 = 3;

/// Write `bytes` to `path` atomically: temp file in the same directory, then
/// rename over the destination.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::store(format!("no parent directory for {}", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .map_err(|e| Error::store(format!("rename into {} failed: {}", path.display(), e.error)))?;
    Ok(())
}

/// Store of per-video [`TranscodeStatus`] snapshots under the media root.
pub struct SnapshotStore {
    root: PathBuf,
    locks: DashMap<VideoId, Arc<Mutex<()>>>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    /// Folder holding everything belonging to one video.
    pub fn video_dir(&self, id: VideoId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Path of the snapshot file for one video.
    pub fn snapshot_path(&self, id: VideoId) -> PathBuf {
        self.video_dir(id).join(SNAPSHOT_FILE)
    }

    fn lock_for(&self, id: VideoId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load the snapshot for a video.
    ///
    /// Returns `Ok(None)` when no snapshot exists (the video has never been
    /// transcoded); a file that exists but does not parse is corruption and
    /// surfaces as a Store error.
    pub async fn load(&self, id: VideoId) -> Result<Option<TranscodeStatus>> {
        let path = self.snapshot_path(id);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map(Some).map_err(|e| {
                Error::store(format!("corrupt snapshot {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a snapshot, serializing with other writers of the same video.
    pub async fn save(&self, id: VideoId, status: &TranscodeStatus) -> Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.save_unlocked(id, status).await
    }

    /// Load, mutate, and save back under the per-video lock. The snapshot
    /// must already exist.
    pub async fn update<F>(&self, id: VideoId, f: F) -> Result<TranscodeStatus>
    where
        F: FnOnce(&mut TranscodeStatus),
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut status = self
            .load(id)
            .await?
            .ok_or_else(|| Error::not_found("snapshot", id))?;
        f(&mut status);
        status.updated_at = chrono::Utc::now();
        self.save_unlocked(id, &status).await?;
        Ok(status)
    }

    /// Update a single rendition record, creating it as pending first if the
    /// snapshot does not track that preset yet.
    pub async fn update_variant<F>(
        &self,
        id: VideoId,
        preset: sl_core::QualityPreset,
        f: F,
    ) -> Result<TranscodeStatus>
    where
        F: FnOnce(&mut VariantRecord),
    {
        self.update(id, |status| {
            let record = status
                .variants
                .entry(preset)
                .or_insert_with(VariantRecord::pending);
            f(record);
        })
        .await
    }

    /// Every video folder under the media root whose name parses as a
    /// [`VideoId`], sorted for deterministic traversal.
    pub fn list_video_ids(&self) -> Result<Vec<VideoId>> {
        let mut ids = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if let Ok(id) = VideoId::from_str(name) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn save_unlocked(&self, id: VideoId, status: &TranscodeStatus) -> Result<()> {
        let dir = self.video_dir(id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        let json = serde_json::to_string_pretty(status)
            .map_err(|e| Error::store(format!("serialize snapshot for {id}: {e}")))?;

        let mut last_err = None;
        for attempt in 1..=SAVE_ATTEMPTS {
            match atomic_write(&path, json.as_bytes()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        video_id = %id,
                        attempt,
                        "snapshot write failed: {e}"
                    );
                    last_err = Some(e);
                    if attempt < SAVE_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(Error::store(format!(
            "snapshot write for {id} failed after {SAVE_ATTEMPTS} attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobState, VariantState};
    use sl_core::QualityPreset;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        (tmp, store)
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let (_tmp, store) = store();
        let loaded = store.load(VideoId::new()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let (_tmp, store) = store();
        let id = VideoId::new();
        let mut status = TranscodeStatus::new(id);
        status.ensure_ladder();
        status.state = JobState::Running;

        store.save(id, &status).await.unwrap();

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.video_id, id);
        assert_eq!(loaded.state, JobState::Running);
        assert_eq!(loaded.variants.len(), 4);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_store_error() {
        let (_tmp, store) = store();
        let id = VideoId::new();
        std::fs::create_dir_all(store.video_dir(id)).unwrap();
        std::fs::write(store.snapshot_path(id), b"{ not json").unwrap();

        let err = store.load(id).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)), "got {err}");
    }

    #[tokio::test]
    async fn save_leaves_only_the_snapshot_file() {
        let (_tmp, store) = store();
        let id = VideoId::new();
        let status = TranscodeStatus::new(id);

        store.save(id, &status).await.unwrap();
        store.save(id, &status).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.video_dir(id))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SNAPSHOT_FILE.to_string()]);
    }

    #[tokio::test]
    async fn update_mutates_and_bumps_timestamp() {
        let (_tmp, store) = store();
        let id = VideoId::new();
        store.save(id, &TranscodeStatus::new(id)).await.unwrap();

        let before = store.load(id).await.unwrap().unwrap().updated_at;
        let updated = store
            .update(id, |s| s.state = JobState::Stopped)
            .await
            .unwrap();
        assert_eq!(updated.state, JobState::Stopped);
        assert!(updated.updated_at >= before);

        let reloaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, JobState::Stopped);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let (_tmp, store) = store();
        let err = store
            .update(VideoId::new(), |s| s.state = JobState::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_variant_creates_missing_record() {
        let (_tmp, store) = store();
        let id = VideoId::new();
        store.save(id, &TranscodeStatus::new(id)).await.unwrap();

        let updated = store
            .update_variant(id, QualityPreset::P720, |r| {
                r.succeed("720p/index.m3u8".into())
            })
            .await
            .unwrap();
        assert_eq!(
            updated.variants[&QualityPreset::P720].state,
            VariantState::Succeeded
        );
    }

    #[tokio::test]
    async fn concurrent_updates_serialize() {
        let (_tmp, store) = store();
        let store = Arc::new(store);
        let id = VideoId::new();
        store.save(id, &TranscodeStatus::new(id)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store
                        .update(id, |s| {
                            s.network_speed_hint = Some(s.network_speed_hint.unwrap_or(0) + 1);
                        })
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_status = store.load(id).await.unwrap().unwrap();
        assert_eq!(final_status.network_speed_hint, Some(100));
    }

    #[tokio::test]
    async fn list_video_ids_skips_foreign_entries() {
        let (tmp, store) = store();
        let a = VideoId::new();
        let b = VideoId::new();
        store.save(a, &TranscodeStatus::new(a)).await.unwrap();
        store.save(b, &TranscodeStatus::new(b)).await.unwrap();

        std::fs::create_dir(tmp.path().join("not-a-video")).unwrap();
        std::fs::write(tmp.path().join("registry.json"), b"{}").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.list_video_ids().unwrap(), expected);
    }

    #[tokio::test]
    async fn list_video_ids_with_missing_root() {
        let store = SnapshotStore::new("/nonexistent/streamladder-media");
        assert!(store.list_video_ids().unwrap().is_empty());
    }
}
