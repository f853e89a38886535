//! Inbound request conversion.
//!
//! # Responsibilities
//! - Turn an axum request into a transport-independent `InboundRequest`
//! - Buffer the body up to the listener limit
//!
//! # Design Decisions
//! - The path is kept exactly as received, percent-encoding included
//! - Request IDs are assigned by the tower-http layers before this runs

use axum::body::Body;
use axum::http::{HeaderValue, Request};

use crate::gateway::InboundRequest;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Read the correlation ID assigned by the request-id layer.
pub fn request_id(request: &Request<Body>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Buffer `request` into an `InboundRequest`. Fails when the body exceeds
/// `max_body_bytes` or cannot be read.
pub async fn into_inbound(request: Request<Body>, max_body_bytes: usize) -> Result<InboundRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes).await?;

    let mut inbound = InboundRequest::new(parts.method, parts.uri.path());
    inbound.query = parts.uri.query().map(str::to_string);
    inbound.headers = parts.headers;
    inbound.body = body;
    Ok(inbound)
}
