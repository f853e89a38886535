//! Fixed fallback responses.
//!
//! Each route answers with its own status and message text whenever the
//! downstream call fails or the breaker rejects it. The failure cause is
//! never part of the body; it is only logged.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use crate::gateway::GatewayResponse;
use crate::routing::RouteSpec;

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    status: StatusCode,
    message: String,
}

impl FallbackPolicy {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_spec(spec: &RouteSpec) -> Self {
        let status = StatusCode::from_u16(spec.fallback_status).unwrap_or(StatusCode::GATEWAY_TIMEOUT);
        Self::new(status, spec.fallback_message.clone())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn respond(&self) -> GatewayResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        GatewayResponse {
            status: self.status,
            headers,
            body: self.message.clone().into(),
            fallback: true,
        }
    }
}
