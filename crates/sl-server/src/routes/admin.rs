//! Operational route handlers.

use axum::extract::State;
use axum::Json;

use crate::context::ServerContext;

/// GET /api/admin/tools
///
/// Reports whether ffmpeg and ffprobe are reachable, with resolved
/// paths and version strings where available.
#[utoipa::path(
    get,
    path = "/api/admin/tools",
    responses(
        (status = 200, description = "Availability report for the external tools", body = Vec<sl_av::ToolInfo>)
    )
)]
pub async fn tool_status(State(ctx): State<ServerContext>) -> Json<Vec<sl_av::ToolInfo>> {
    Json(ctx.tools.inventory())
}
