//! Master playlist composition.
//!
//! Bridges the durable snapshot and the pure generator in `sl-media`: reads
//! which renditions succeeded, renders the master playlist, and writes it
//! atomically into the video folder.

use std::path::PathBuf;

use sl_core::VideoId;
use sl_media::{generate_master_playlist, master_for_variants, MASTER_FILE};
use sl_store::{snapshot::atomic_write, SnapshotStore};

/// Compose (or retire) the master playlist for a video from its snapshot.
///
/// Returns the playlist path when at least one rendition succeeded. With
/// zero succeeded renditions any stale master from an earlier run is deleted
/// and `None` is returned, so the file's presence can always be trusted as
/// "this video is playable".
pub async fn compose(
    store: &SnapshotStore,
    video_id: VideoId,
) -> sl_core::Result<Option<PathBuf>> {
    let status = store
        .load(video_id)
        .await?
        .ok_or_else(|| sl_core::Error::not_found("video", video_id))?;

    let master_path = store.video_dir(video_id).join(MASTER_FILE);
    let succeeded = status.succeeded_playlists();

    if succeeded.is_empty() {
        match tokio::fs::remove_file(&master_path).await {
            Ok(()) => {
                tracing::debug!(video_id = %video_id, "Removed stale master playlist")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        return Ok(None);
    }

    let playlist = master_for_variants(&succeeded);
    let rendered = generate_master_playlist(&playlist);
    atomic_write(&master_path, rendered.as_bytes())?;

    tracing::info!(
        video_id = %video_id,
        variants = succeeded.len(),
        "Composed master playlist"
    );

    Ok(Some(master_path))
}
