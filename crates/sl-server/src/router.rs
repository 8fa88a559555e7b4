//! HTTP router assembly.
//!
//! Wires the route handlers into one Axum router, mounts the OpenAPI
//! document with its Swagger UI, and stacks the shared middleware.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::context::ServerContext;
use crate::middleware::request_id::attach_request_id;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::videos::register_video,
        routes::videos::list_videos,
        routes::videos::start_transcode,
        routes::videos::resume_transcode,
        routes::videos::stop_transcode,
        routes::videos::get_status,
        routes::videos::get_qualities,
        routes::admin::tool_status,
        routes::health::health,
    ),
    components(schemas(
        routes::videos::RegisterVideoRequest,
        routes::videos::VideoResponse,
        routes::videos::TranscodeRequest,
        routes::videos::TranscodeAccepted,
        routes::videos::StatusResponse,
        routes::videos::VariantStatusResponse,
        routes::videos::QualitiesResponse,
        sl_av::ToolInfo,
    ))
)]
struct ApiDoc;

/// Assemble the full application router.
pub fn build_router(ctx: ServerContext) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let swagger = SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi());

    // Everything under /api shares the ServerContext state.
    let api = Router::new()
        // Video registry and job control
        .route("/videos", get(routes::videos::list_videos).post(routes::videos::register_video))
        .route("/videos/{id}/transcode", post(routes::videos::start_transcode))
        .route("/videos/{id}/resume", post(routes::videos::resume_transcode))
        .route("/videos/{id}/stop", post(routes::videos::stop_transcode))
        .route("/videos/{id}/status", get(routes::videos::get_status))
        .route("/videos/{id}/qualities", get(routes::videos::get_qualities))
        // Live job events over SSE
        .route("/events", get(routes::events::stream_events))
        // Runtime transcode settings
        .route(
            "/config/transcode",
            get(routes::config::get_transcode).put(routes::config::update_transcode),
        )
        .route("/config/reload", post(routes::config::reload))
        // Operational
        .route("/admin/tools", get(routes::admin::tool_status));

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api", api)
        .merge(swagger)
        .layer(middleware::from_fn(attach_request_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
