//! Runtime configuration route handlers.
//!
//! Only the transcode section may be edited while the server runs; the
//! rest of the configuration is fixed at startup. Edits go through
//! [`crate::context::LiveConfig`] so running jobs pick them up on
//! their next read.

use axum::extract::State;
use axum::Json;

use sl_core::config::TranscodeConfig;

use crate::context::ServerContext;

/// GET /api/config/transcode
pub async fn get_transcode(State(ctx): State<ServerContext>) -> Json<TranscodeConfig> {
    Json(ctx.live_config.get_transcode())
}

/// PUT /api/config/transcode
pub async fn update_transcode(
    State(ctx): State<ServerContext>,
    Json(cfg): Json<TranscodeConfig>,
) -> Json<TranscodeConfig> {
    ctx.live_config.set_transcode(cfg.clone());
    ctx.live_config.persist();
    Json(cfg)
}

/// POST /api/config/reload
///
/// Re-reads the config file and answers with the transcode settings
/// now in effect.
pub async fn reload(State(ctx): State<ServerContext>) -> Json<TranscodeConfig> {
    ctx.live_config.reload();
    Json(ctx.live_config.get_transcode())
}
