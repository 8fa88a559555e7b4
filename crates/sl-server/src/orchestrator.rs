//! Transcode job orchestration.
//!
//! At most one orchestration runs per video at a time. The `DashMap` entry in
//! [`ServerContext::active_jobs`] is both the duplicate-start guard and the
//! cooperative stop channel. The worker walks the quality ladder largest
//! first and persists every transition before acting on it, so a crash at any
//! point leaves a resumable `status.json` behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;

use sl_av::VariantRequest;
use sl_core::events::EventPayload;
use sl_core::{QualityPreset, VideoId};
use sl_store::{JobState, TranscodeStatus};

use crate::context::ServerContext;
use crate::manifest;

// ---------------------------------------------------------------------------
// Start / resume
// ---------------------------------------------------------------------------

/// Outcome of a start or resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker was spawned for this video.
    Started,
    /// An orchestration already owns this video; the request was a no-op.
    AlreadyRunning,
}

/// Start (or resume) the transcode job for a registered video.
///
/// Start and resume share this path: the snapshot is reset so every
/// non-settled rendition is attempted again, while succeeded and skipped
/// renditions are left alone. A second trigger while a worker is active
/// returns [`StartOutcome::AlreadyRunning`] without touching the snapshot.
pub async fn start_job(
    ctx: &ServerContext,
    video_id: VideoId,
    network_speed_hint: Option<u64>,
) -> sl_core::Result<StartOutcome> {
    let entry = ctx
        .registry
        .get(video_id)
        .ok_or_else(|| sl_core::Error::not_found("video", video_id))?;

    let source = ctx.store.video_dir(video_id).join(&entry.source_name);
    if !source.exists() {
        return Err(sl_core::Error::Validation(format!(
            "source file {} is not in place yet",
            source.display()
        )));
    }

    // Claim the video. Whoever inserts the entry owns the orchestration.
    let stop = Arc::new(AtomicBool::new(false));
    match ctx.active_jobs.entry(video_id) {
        Entry::Occupied(_) => return Ok(StartOutcome::AlreadyRunning),
        Entry::Vacant(vacant) => {
            vacant.insert(Arc::clone(&stop));
        }
    }

    // Seed the snapshot as running before the worker exists, so a crash
    // between here and the first rendition is picked up by startup recovery.
    if let Err(e) = seed_snapshot(ctx, video_id, &entry.source_name, network_speed_hint).await {
        ctx.active_jobs.remove(&video_id);
        return Err(e);
    }

    ctx.event_bus
        .broadcast(EventPayload::TranscodeQueued { video_id });

    let worker_ctx = ctx.clone();
    tokio::spawn(async move {
        run_transcode(worker_ctx, video_id, source, stop).await;
    });

    Ok(StartOutcome::Started)
}

/// Load-or-create the snapshot, reset non-settled renditions, mark it running.
async fn seed_snapshot(
    ctx: &ServerContext,
    video_id: VideoId,
    source_name: &str,
    network_speed_hint: Option<u64>,
) -> sl_core::Result<()> {
    let mut status = ctx
        .store
        .load(video_id)
        .await?
        .unwrap_or_else(|| TranscodeStatus::new(video_id));

    status.source_name = Some(source_name.to_string());
    if network_speed_hint.is_some() {
        status.network_speed_hint = network_speed_hint;
    }
    status.reset_for_resume();
    status.ensure_ladder();
    status.state = JobState::Running;
    status.updated_at = chrono::Utc::now();

    ctx.store.save(video_id, &status).await
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

/// Request a cooperative stop of a running job.
///
/// The request is persisted first so it survives a crash, then the live
/// worker's flag is set if one is active. An in-flight encode is never
/// killed; the worker halts at the next quality boundary. Idempotent, and
/// valid on idle videos (the flag simply waits there).
pub async fn stop_job(ctx: &ServerContext, video_id: VideoId) -> sl_core::Result<TranscodeStatus> {
    let status = ctx
        .store
        .update(video_id, |status| {
            status.stop_requested = true;
        })
        .await?;

    if let Some(flag) = ctx.active_jobs.get(&video_id) {
        flag.store(true, Ordering::Relaxed);
        tracing::info!(
            video_id = %video_id,
            "Stop requested; worker halts at the next quality boundary"
        );
    } else {
        tracing::info!(video_id = %video_id, "Stop requested for idle video");
    }

    Ok(status)
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Terminal result of one orchestration run.
enum JobOutcome {
    Completed { succeeded: u64 },
    Stopped,
    Failed { error: String },
}

/// The per-video worker: probe, walk the ladder, compose, settle.
async fn run_transcode(
    ctx: ServerContext,
    video_id: VideoId,
    source: PathBuf,
    stop: Arc<AtomicBool>,
) {
    tracing::info!(video_id = %video_id, source = %source.display(), "Transcode worker started");
    ctx.event_bus
        .broadcast(EventPayload::TranscodeStarted { video_id });

    let outcome = match transcode_video(&ctx, video_id, &source, &stop).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Reaching here means a snapshot write already failed after its
            // retries, so persisting the failure is best effort.
            let error = e.to_string();
            let _ = ctx
                .store
                .update(video_id, |status| {
                    status.state = JobState::Failed;
                    status.error = Some(error.clone());
                })
                .await;
            JobOutcome::Failed { error }
        }
    };

    match outcome {
        JobOutcome::Completed { succeeded } => {
            tracing::info!(video_id = %video_id, succeeded, "Transcode job completed");
            ctx.event_bus
                .broadcast(EventPayload::TranscodeCompleted {
                    video_id,
                    succeeded,
                });
        }
        JobOutcome::Stopped => {
            tracing::info!(video_id = %video_id, "Transcode job stopped");
            ctx.event_bus
                .broadcast(EventPayload::TranscodeStopped { video_id });
        }
        JobOutcome::Failed { error } => {
            tracing::error!(video_id = %video_id, error = %error, "Transcode job failed");
            ctx.event_bus
                .broadcast(EventPayload::TranscodeFailed { video_id, error });
        }
    }

    ctx.active_jobs.remove(&video_id);
}

/// Execute the pipeline for one video. Persists its own terminal state and
/// returns the outcome for eventing; an `Err` means even the snapshot could
/// not be written.
async fn transcode_video(
    ctx: &ServerContext,
    video_id: VideoId,
    source: &Path,
    stop: &AtomicBool,
) -> sl_core::Result<JobOutcome> {
    let probe_timeout = timeout_of(ctx.live_config.get_transcode().probe_timeout_secs);

    // Probe first: the skip policy cannot be decided without the source
    // resolution.
    let info = match ctx.transcoder.probe(source, probe_timeout).await {
        Ok(info) => info,
        Err(e) => {
            let error = format!("probe failed: {e}");
            ctx.store
                .update(video_id, |status| {
                    status.state = JobState::Failed;
                    status.error = Some(error.clone());
                })
                .await?;
            return Ok(JobOutcome::Failed { error });
        }
    };

    let quality_label = QualityPreset::original_quality_label(info.height);
    let status = ctx
        .store
        .update(video_id, |status| {
            status.original_width = Some(info.width);
            status.original_height = Some(info.height);
            status.original_quality = Some(quality_label.to_string());
        })
        .await?;

    // The registry copy exists for external readers; its failure must not
    // stop the job.
    if let Err(e) = ctx
        .registry
        .set_probe_info(video_id, info.width, info.height, quality_label)
    {
        tracing::warn!(video_id = %video_id, "Failed to write probe info to registry: {e}");
    }

    for preset in QualityPreset::all() {
        if stop.load(Ordering::Relaxed) {
            ctx.store
                .update(video_id, |status| {
                    status.state = JobState::Stopped;
                    status.stop_requested = true;
                })
                .await?;
            tracing::info!(
                video_id = %video_id,
                quality = %preset,
                "Stop flag observed; halting before this rendition"
            );
            return Ok(JobOutcome::Stopped);
        }

        // Succeeded and skipped renditions from an earlier run stay settled.
        if status.variants.get(&preset).is_some_and(|r| r.is_settled()) {
            tracing::debug!(video_id = %video_id, quality = %preset, "Rendition already settled");
            continue;
        }

        if preset.height() > info.height {
            ctx.store
                .update_variant(video_id, preset, |record| record.skip())
                .await?;
            tracing::info!(
                video_id = %video_id,
                quality = %preset,
                source_height = info.height,
                "Rendition above source resolution; skipped"
            );
            ctx.event_bus.broadcast(EventPayload::VariantSkipped {
                video_id,
                quality: preset,
            });
            continue;
        }

        ctx.store
            .update_variant(video_id, preset, |record| record.begin())
            .await?;
        ctx.event_bus.broadcast(EventPayload::VariantStarted {
            video_id,
            quality: preset,
        });

        // Config is re-read per rendition so edits apply from the next rung.
        let transcode_cfg = ctx.live_config.get_transcode();
        let request = VariantRequest {
            source: source.to_path_buf(),
            video_dir: ctx.store.video_dir(video_id),
            preset,
            segment_seconds: transcode_cfg.segment_seconds,
            video_preset: transcode_cfg.video_preset.clone(),
            hw_accel: transcode_cfg.hw_accel.clone(),
            encode_timeout: timeout_of(transcode_cfg.encode_timeout_secs),
        };

        match ctx.transcoder.encode_variant(&request).await {
            Ok(artifacts) => {
                ctx.store
                    .update_variant(video_id, preset, |record| {
                        record.succeed(artifacts.playlist)
                    })
                    .await?;
                tracing::info!(video_id = %video_id, quality = %preset, "Rendition succeeded");
                ctx.event_bus.broadcast(EventPayload::VariantSucceeded {
                    video_id,
                    quality: preset,
                });
            }
            Err(e) => {
                // A failed rendition does not abort the ladder walk.
                let error = e.to_string();
                tracing::warn!(
                    video_id = %video_id,
                    quality = %preset,
                    error = %error,
                    "Rendition failed"
                );
                ctx.store
                    .update_variant(video_id, preset, |record| record.fail(error.clone()))
                    .await?;
                ctx.event_bus.broadcast(EventPayload::VariantFailed {
                    video_id,
                    quality: preset,
                    error,
                });
            }
        }
    }

    let status = ctx
        .store
        .load(video_id)
        .await?
        .ok_or_else(|| sl_core::Error::not_found("snapshot", video_id))?;
    let succeeded = status.succeeded_count();

    match manifest::compose(&ctx.store, video_id).await {
        Ok(Some(_)) => {
            ctx.store
                .update(video_id, |status| {
                    status.state = JobState::Completed;
                    status.error = None;
                })
                .await?;
            Ok(JobOutcome::Completed { succeeded })
        }
        Ok(None) => {
            let error = "no renditions succeeded".to_string();
            ctx.store
                .update(video_id, |status| {
                    status.state = JobState::Failed;
                    status.error = Some(error.clone());
                })
                .await?;
            Ok(JobOutcome::Failed { error })
        }
        Err(e) => {
            let error = format!("master playlist composition failed: {e}");
            ctx.store
                .update(video_id, |status| {
                    status.state = JobState::Failed;
                    status.error = Some(error.clone());
                })
                .await?;
            Ok(JobOutcome::Failed { error })
        }
    }
}

/// Map a config timeout in seconds to a `Duration`, with `0` meaning "none".
fn timeout_of(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
