//! sl-server: HTTP API server and transcode orchestration.
//!
//! Ties the other sl-* crates into a running service:
//!
//! - Axum HTTP API with OpenAPI docs and SSE progress events
//! - the per-video orchestrator that walks the quality ladder
//! - the startup recovery scan that resumes interrupted jobs
//! - graceful shutdown on SIGINT/SIGTERM

pub mod cache;
pub mod context;
pub mod error;
pub mod manifest;
pub mod middleware;
pub mod orchestrator;
pub mod recovery;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use sl_av::{FfmpegTranscoder, ToolRegistry, Transcoder};
use sl_core::config::Config;
use sl_core::events::EventBus;
use sl_store::{SnapshotStore, VideoRegistry};

use crate::cache::TtlCache;
use crate::context::{LiveConfig, ServerContext};

/// How long a cached status snapshot may be served before re-reading disk.
const STATUS_CACHE_TTL: Duration = Duration::from_secs(1);

/// Construct the shared [`ServerContext`] from configuration.
///
/// Creates the media root if needed, locates the external tools, and
/// wires the stores, event bus, and status cache together. Used by
/// [`start`] and by the one-shot CLI transcode path.
pub fn build_context(config: Config, config_path: Option<PathBuf>) -> sl_core::Result<ServerContext> {
    let media_root = &config.storage.media_root;
    if media_root.exists() {
        tracing::info!("using media root {}", media_root.display());
    } else {
        std::fs::create_dir_all(media_root)?;
        tracing::info!("created media root {}", media_root.display());
    }

    let tool_registry = ToolRegistry::discover(&config.tools);
    for info in tool_registry.inventory() {
        if info.available {
            let version = info.version.as_deref().unwrap_or("unknown version");
            tracing::info!("found {} ({version})", info.name);
        } else {
            tracing::warn!("{} is not available", info.name);
        }
    }

    let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::new(tool_registry.clone()));
    let store = SnapshotStore::new(media_root.clone());
    let registry = VideoRegistry::open(media_root)?;
    let live_config = LiveConfig::new(&config, config_path);

    Ok(ServerContext {
        config: Arc::new(config),
        live_config: Arc::new(live_config),
        event_bus: Arc::new(EventBus::default()),
        tools: Arc::new(tool_registry),
        transcoder,
        store: Arc::new(store),
        registry: Arc::new(registry),
        active_jobs: Arc::new(DashMap::new()),
        status_cache: Arc::new(TtlCache::new(STATUS_CACHE_TTL)),
    })
}

/// Run the streamladder server until a shutdown signal arrives.
///
/// Builds the [`ServerContext`], kicks off the recovery scan in the
/// background, and serves HTTP.
pub async fn start(config: Config, config_path: Option<PathBuf>) -> sl_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    let ctx = build_context(config, config_path)?;

    let cancel = CancellationToken::new();

    // The recovery scan runs concurrently with the listener so resuming
    // a backlog of interrupted jobs never delays first request service.
    let recovery_ctx = ctx.clone();
    let recovery_cancel = cancel.clone();
    let recovery_handle = tokio::spawn(async move {
        tokio::select! {
            result = recovery::scan_and_resume(&recovery_ctx) => {
                if let Err(e) = result {
                    tracing::warn!("recovery scan failed: {e}");
                }
            }
            _ = recovery_cancel.cancelled() => {
                tracing::debug!("recovery scan cancelled by shutdown");
            }
        }
    });

    let bind = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    let addr = bind
        .parse::<SocketAddr>()
        .map_err(|e| sl_core::Error::Internal(format!("bad listen address: {e}")))?;

    let app = router::build_router(ctx);

    tracing::info!("listening on {addr}");

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => return Err(sl_core::Error::Internal(format!("cannot bind {addr}: {e}"))),
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| sl_core::Error::Internal(format!("server error: {e}")))?;

    // Stop background tasks. In-flight transcodes die with the process;
    // the recovery scan picks them up at the next startup.
    cancel.cancel();
    let _ = recovery_handle.await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolve when SIGINT or SIGTERM arrives (or the token fires).
async fn shutdown_signal(cancel: CancellationToken) {
    use tokio::signal;

    let interrupt = async {
        signal::ctrl_c().await.expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("shutdown signal received");
}
