//! Gateway request and response values.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::routing::PathParams;
use crate::transport::DownstreamResponse;

/// An inbound call, independent of the HTTP server that received it.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Parameters captured from the path; filled in by route matching.
    pub params: PathParams,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: PathParams::new(),
        }
    }
}

/// What the gateway answers.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// True when this is the route's fallback rather than a downstream answer.
    pub fallback: bool,
}

impl GatewayResponse {
    pub fn from_downstream(response: DownstreamResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            fallback: false,
        }
    }
}
