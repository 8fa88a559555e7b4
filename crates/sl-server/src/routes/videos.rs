//! Video registration and transcode lifecycle route handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sl_core::VideoId;
use sl_media::MASTER_FILE;
use sl_store::{RegistryEntry, TranscodeStatus};

use crate::context::ServerContext;
use crate::error::ApiError;
use crate::orchestrator::{self, StartOutcome};

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for registering an uploaded video.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterVideoRequest {
    /// Video id to register under; a fresh one is minted when omitted.
    pub video_id: Option<String>,
    /// Bare file name of the assembled source inside the video folder.
    pub source_name: String,
}

/// Registered video response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoResponse {
    pub video_id: String,
    pub source_name: String,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    pub original_quality: Option<String>,
    pub registered_at: String,
}

impl VideoResponse {
    fn from_entry(entry: &RegistryEntry) -> Self {
        Self {
            video_id: entry.video_id.to_string(),
            source_name: entry.source_name.clone(),
            original_width: entry.original_width,
            original_height: entry.original_height,
            original_quality: entry.original_quality.clone(),
            registered_at: entry.registered_at.to_rfc3339(),
        }
    }
}

/// Request body for starting a transcode.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct TranscodeRequest {
    /// Client-measured bandwidth in bits per second. Recorded on the
    /// snapshot; it never alters the ladder.
    pub network_speed_hint: Option<u64>,
}

/// Acknowledgment for start and resume triggers.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TranscodeAccepted {
    /// Whether a new worker was spawned (`false`: one was already running).
    pub accepted: bool,
    /// Job state as of this acknowledgment.
    pub state: String,
}

impl TranscodeAccepted {
    fn from_outcome(outcome: StartOutcome) -> Self {
        Self {
            accepted: outcome == StartOutcome::Started,
            state: sl_store::JobState::Running.to_string(),
        }
    }
}

/// One rendition's progress within a status response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VariantStatusResponse {
    pub quality: String,
    pub state: String,
    pub playlist: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Full job status response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub video_id: String,
    pub state: String,
    pub stop_requested: bool,
    pub source_name: Option<String>,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    pub original_quality: Option<String>,
    pub network_speed_hint: Option<u64>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub variants: Vec<VariantStatusResponse>,
}

impl StatusResponse {
    fn from_status(status: &TranscodeStatus) -> Self {
        Self {
            video_id: status.video_id.to_string(),
            state: status.state.to_string(),
            stop_requested: status.stop_requested,
            source_name: status.source_name.clone(),
            original_width: status.original_width,
            original_height: status.original_height,
            original_quality: status.original_quality.clone(),
            network_speed_hint: status.network_speed_hint,
            error: status.error.clone(),
            created_at: status.created_at.to_rfc3339(),
            updated_at: status.updated_at.to_rfc3339(),
            variants: status
                .variants
                .iter()
                .map(|(preset, record)| VariantStatusResponse {
                    quality: preset.label().to_string(),
                    state: record.state.to_string(),
                    playlist: record.playlist.clone(),
                    error: record.error.clone(),
                    started_at: record.started_at.map(|t| t.to_rfc3339()),
                    finished_at: record.finished_at.map(|t| t.to_rfc3339()),
                })
                .collect(),
        }
    }

    /// Synthetic response for a registered video that has never run.
    fn not_started(entry: &RegistryEntry) -> Self {
        Self {
            video_id: entry.video_id.to_string(),
            state: sl_store::JobState::NotStarted.to_string(),
            stop_requested: false,
            source_name: Some(entry.source_name.clone()),
            original_width: entry.original_width,
            original_height: entry.original_height,
            original_quality: entry.original_quality.clone(),
            network_speed_hint: None,
            error: None,
            created_at: entry.registered_at.to_rfc3339(),
            updated_at: entry.registered_at.to_rfc3339(),
            variants: Vec::new(),
        }
    }
}

/// Playable renditions response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QualitiesResponse {
    /// Labels of succeeded renditions, highest first.
    pub available: Vec<String>,
    /// Master playlist path relative to the video folder, when playable.
    pub master: Option<String>,
}

fn parse_video_id(raw: &str) -> Result<VideoId, ApiError> {
    raw.parse()
        .map_err(|_| sl_core::Error::Validation("Invalid video ID".into()).into())
}

// ---------------------------------------------------------------------------
// Registration and listing
// ---------------------------------------------------------------------------

/// POST /api/videos
#[utoipa::path(
    post,
    path = "/api/videos",
    request_body = RegisterVideoRequest,
    responses(
        (status = 201, description = "Video registered", body = VideoResponse),
        (status = 400, description = "Invalid id or source name")
    )
)]
pub async fn register_video(
    State(ctx): State<ServerContext>,
    Json(payload): Json<RegisterVideoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = payload
        .video_id
        .as_deref()
        .map(|raw| {
            raw.parse::<VideoId>()
                .map_err(|_| sl_core::Error::Validation("Invalid video_id".into()))
        })
        .transpose()?;

    let entry = ctx.registry.register(video_id, &payload.source_name)?;
    tracing::info!(
        video_id = %entry.video_id,
        source = %entry.source_name,
        "Video registered"
    );

    Ok((StatusCode::CREATED, Json(VideoResponse::from_entry(&entry))))
}

/// GET /api/videos
#[utoipa::path(
    get,
    path = "/api/videos",
    responses(
        (status = 200, description = "List registered videos", body = Vec<VideoResponse>)
    )
)]
pub async fn list_videos(State(ctx): State<ServerContext>) -> Json<Vec<VideoResponse>> {
    Json(ctx.registry.list().iter().map(VideoResponse::from_entry).collect())
}

// ---------------------------------------------------------------------------
// Lifecycle triggers
// ---------------------------------------------------------------------------

/// POST /api/videos/{id}/transcode
#[utoipa::path(
    post,
    path = "/api/videos/{id}/transcode",
    params(("id" = String, Path, description = "Video ID")),
    request_body = TranscodeRequest,
    responses(
        (status = 202, description = "Transcode accepted", body = TranscodeAccepted),
        (status = 404, description = "Video not registered")
    )
)]
pub async fn start_transcode(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
    payload: Option<Json<TranscodeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_video_id(&id)?;
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    if let Some(hint) = request.network_speed_hint {
        tracing::info!(
            video_id = %video_id,
            network_speed_hint = hint,
            "Client bandwidth hint recorded"
        );
    }

    let outcome = orchestrator::start_job(&ctx, video_id, request.network_speed_hint).await?;
    ctx.status_cache.invalidate(&video_id);

    Ok((StatusCode::ACCEPTED, Json(TranscodeAccepted::from_outcome(outcome))))
}

/// POST /api/videos/{id}/resume
#[utoipa::path(
    post,
    path = "/api/videos/{id}/resume",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 202, description = "Resume accepted", body = TranscodeAccepted),
        (status = 404, description = "Video not registered")
    )
)]
pub async fn resume_transcode(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_video_id(&id)?;

    let outcome = orchestrator::start_job(&ctx, video_id, None).await?;
    ctx.status_cache.invalidate(&video_id);

    Ok((StatusCode::ACCEPTED, Json(TranscodeAccepted::from_outcome(outcome))))
}

/// POST /api/videos/{id}/stop
#[utoipa::path(
    post,
    path = "/api/videos/{id}/stop",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Stop recorded", body = StatusResponse),
        (status = 404, description = "No job for this video")
    )
)]
pub async fn stop_transcode(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let video_id = parse_video_id(&id)?;

    let status = orchestrator::stop_job(&ctx, video_id).await?;
    ctx.status_cache.invalidate(&video_id);

    Ok(Json(StatusResponse::from_status(&status)))
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// GET /api/videos/{id}/status
#[utoipa::path(
    get,
    path = "/api/videos/{id}/status",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Job status", body = StatusResponse),
        (status = 404, description = "Video not registered")
    )
)]
pub async fn get_status(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let video_id = parse_video_id(&id)?;

    if let Some(status) = ctx.status_cache.get(&video_id) {
        return Ok(Json(StatusResponse::from_status(&status)));
    }

    match ctx.store.load(video_id).await? {
        Some(status) => {
            ctx.status_cache.insert(video_id, status.clone());
            Ok(Json(StatusResponse::from_status(&status)))
        }
        None => {
            // Registered but never transcoded reports a synthetic
            // not-started status rather than a 404.
            let entry = ctx
                .registry
                .get(video_id)
                .ok_or_else(|| sl_core::Error::not_found("video", video_id))?;
            Ok(Json(StatusResponse::not_started(&entry)))
        }
    }
}

/// GET /api/videos/{id}/qualities
#[utoipa::path(
    get,
    path = "/api/videos/{id}/qualities",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Playable renditions", body = QualitiesResponse),
        (status = 404, description = "Video not registered")
    )
)]
pub async fn get_qualities(
    State(ctx): State<ServerContext>,
    Path(id): Path<String>,
) -> Result<Json<QualitiesResponse>, ApiError> {
    let video_id = parse_video_id(&id)?;

    let status = match ctx.store.load(video_id).await? {
        Some(status) => status,
        None => {
            ctx.registry
                .get(video_id)
                .ok_or_else(|| sl_core::Error::not_found("video", video_id))?;
            return Ok(Json(QualitiesResponse { available: Vec::new(), master: None }));
        }
    };

    let available = status
        .succeeded_playlists()
        .iter()
        .map(|(preset, _)| preset.label().to_string())
        .collect();

    let master_path = ctx.store.video_dir(video_id).join(MASTER_FILE);
    let master = master_path.exists().then(|| MASTER_FILE.to_string());

    Ok(Json(QualitiesResponse { available, master }))
}
