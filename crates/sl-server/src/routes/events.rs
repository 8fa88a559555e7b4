//! Event streaming over SSE.
//!
//! Streams the [`sl_core::events::EventBus`] to HTTP clients. Late
//! joiners get a replay of the recent-event ring first, then live
//! events, with periodic heartbeats so proxies keep the connection
//! open. An optional `?video=` query narrows the stream to one video.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;

use sl_core::events::EventPayload;
use sl_core::VideoId;

use crate::context::ServerContext;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How many ring events a late joiner gets replayed.
const REPLAY_DEPTH: usize = 50;

#[derive(Debug, Deserialize)]
pub struct StreamFilter {
    /// Only stream events for this video id.
    pub video: Option<VideoId>,
}

/// GET /api/events
///
/// SSE stream of job lifecycle events: a short replay of recent events,
/// then live delivery, with heartbeats to keep the connection open.
pub async fn stream_events(
    State(ctx): State<ServerContext>,
    Query(query): Query<StreamFilter>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let filter = query.video;

    // Snapshot the ring and subscribe before the stream starts, so no
    // event falls between replay and live delivery.
    let recent = ctx.event_bus.recent(REPLAY_DEPTH);
    let mut live = ctx.event_bus.subscribe();

    let stream = async_stream::stream! {
        // Ring is newest-first; replay in the order things happened.
        for event in recent.into_iter().rev().filter(|e| matches_video(&e.payload, filter)) {
            if let Some(sse) = as_sse(&event) {
                yield Ok(sse);
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                received = live.recv() => {
                    use tokio::sync::broadcast::error::RecvError;
                    match received {
                        Ok(event) if matches_video(&event.payload, filter) => {
                            if let Some(sse) = as_sse(&event) {
                                yield Ok(sse);
                            }
                        }
                        Ok(_) => {}
                        // Keep receiving; the client just missed some events.
                        Err(RecvError::Lagged(n)) => tracing::debug!("subscriber lagged by {n}"),
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("heartbeat").data(r#"{"type":"heartbeat"}"#));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("ping"))
}

fn as_sse(event: &sl_core::events::Event) -> Option<Event> {
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().data(data))
}

/// Recovery events carry no video id, so a video filter excludes them.
fn matches_video(payload: &EventPayload, filter: Option<VideoId>) -> bool {
    let Some(filter) = filter else { return true };
    match payload {
        EventPayload::TranscodeQueued { video_id }
        | EventPayload::TranscodeStarted { video_id }
        | EventPayload::TranscodeCompleted { video_id, .. }
        | EventPayload::TranscodeFailed { video_id, .. }
        | EventPayload::TranscodeStopped { video_id }
        | EventPayload::VariantStarted { video_id, .. }
        | EventPayload::VariantSucceeded { video_id, .. }
        | EventPayload::VariantFailed { video_id, .. }
        | EventPayload::VariantSkipped { video_id, .. } => *video_id == filter,
        EventPayload::RecoveryStarted { .. } | EventPayload::RecoveryCompleted { .. } => false,
    }
}
