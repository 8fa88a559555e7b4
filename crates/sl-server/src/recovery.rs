//! Startup crash recovery.
//!
//! One scan of the media root when the server boots: any job the previous
//! process left running, or stopped without a standing stop request, is
//! resubmitted through the normal start path. Everything else on disk is
//! left exactly as found.

use sl_core::events::EventPayload;
use sl_store::JobState;

use crate::context::ServerContext;
use crate::orchestrator::{self, StartOutcome};

/// Scan every video folder under the media root and resume interrupted jobs.
///
/// Per-video failures (unreadable snapshot, vanished source) are logged and
/// counted; the scan always runs to the end.
pub async fn scan_and_resume(ctx: &ServerContext) -> sl_core::Result<()> {
    let ids = ctx.store.list_video_ids()?;

    tracing::info!("Recovery scan: checking {} videos", ids.len());
    ctx.event_bus.broadcast(EventPayload::RecoveryStarted {
        videos: ids.len() as u64,
    });

    let mut resumed = 0u64;
    let mut skipped = 0u64;
    let mut errors = 0u64;

    for video_id in ids {
        let status = match ctx.store.load(video_id).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Folder without a snapshot: registered but never transcoded.
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(video_id = %video_id, "Recovery: unreadable snapshot: {e}");
                errors += 1;
                continue;
            }
        };

        let interrupted = status.state == JobState::Running
            || (status.state == JobState::Stopped && !status.stop_requested);
        if !interrupted {
            skipped += 1;
            continue;
        }

        match orchestrator::start_job(ctx, video_id, None).await {
            Ok(StartOutcome::Started) => {
                tracing::info!(
                    video_id = %video_id,
                    state = %status.state,
                    "Recovery: resumed interrupted job"
                );
                resumed += 1;
            }
            Ok(StartOutcome::AlreadyRunning) => {
                skipped += 1;
            }
            Err(e) => {
                tracing::warn!(video_id = %video_id, "Recovery: failed to resume: {e}");
                errors += 1;
            }
        }
    }

    tracing::info!("Recovery scan complete: {resumed} resumed, {skipped} skipped, {errors} errors");
    ctx.event_bus.broadcast(EventPayload::RecoveryCompleted {
        resumed,
        skipped,
        errors,
    });

    Ok(())
}
