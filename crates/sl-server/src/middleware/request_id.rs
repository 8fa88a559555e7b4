//! Per-request correlation IDs.
//!
//! Each request either carries an `x-request-id` header from the caller
//! or gets a fresh UUID. The id is attached to a tracing span covering
//! the whole request and echoed back on the response.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request identifier.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware that tags every request with an id for log correlation.
pub async fn attach_request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = caller_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next
        .run(request)
        .instrument(tracing::info_span!("request", request_id = %request_id))
        .await;

    // Echo the id so clients can correlate their logs with ours.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

fn caller_id(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(&REQUEST_ID_HEADER)?.to_str().ok()?;
    Some(raw.to_owned())
}

/// Request id made available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);
