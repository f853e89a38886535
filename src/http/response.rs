//! Outbound response conversion.
//!
//! # Responsibilities
//! - Turn gateway responses and errors into axum responses
//! - Strip hop-by-hop headers copied from the downstream answer
//!
//! # Design Decisions
//! - Fallbacks and downstream answers leave through the same path
//! - Gateway errors answer with a short plain-text reason, never a
//!   downstream failure cause

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::gateway::{forwardable_headers, GatewayError, GatewayResponse};

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = forwardable_headers(&self.headers);
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        plain_text(self.status_code(), self.to_string())
    }
}

/// A plain-text response with the given status.
pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn test_downstream_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let gateway_response = GatewayResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"{}"),
            fallback: false,
        };

        let response = gateway_response.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[test]
    fn test_gateway_error_status() {
        let response = GatewayError::UnsupportedMediaType {
            route: "schedule".to_string(),
            expected: "application/json".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
