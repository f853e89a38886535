//! HTTP/1.1 transport on a fresh connection per attempt.
//!
//! # Responsibilities
//! - Resolve the target authority and open a TCP connection
//! - Perform the HTTP/1.1 handshake and write the request
//! - Buffer the response body up to a size limit
//!
//! # Design Decisions
//! - One connection per attempt: the send point is observable, which a
//!   pooled client hides
//! - Everything before the handshake completes counts as "not sent"

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use url::Url;

use crate::transport::{DownstreamResponse, OutboundRequest, SendReceipt, Transport, TransportError};

/// Default cap on buffered downstream bodies.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    max_response_bytes: usize,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        receipt: &SendReceipt,
    ) -> Result<DownstreamResponse, TransportError> {
        let invalid = |reason: String| TransportError::InvalidTarget {
            url: request.url.clone(),
            reason,
        };

        let url = Url::parse(&request.url).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host".to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = format!("{}:{}", host, port);

        let mut path_and_query = url.path().to_string();
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(path_and_query);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers.iter() {
                headers.append(name.clone(), value.clone());
            }
            let host_value = HeaderValue::from_str(&authority).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header::HOST, host_value);
        }
        let outbound = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| invalid(e.to_string()))?;

        let stream = TcpStream::connect(&authority)
            .await
            .map_err(|e| TransportError::Connect {
                authority: authority.clone(),
                reason: e.to_string(),
            })?;
        let (mut sender, connection) = http1::handshake::<_, Body>(TokioIo::new(stream))
            .await
            .map_err(|e| TransportError::Connect {
                authority: authority.clone(),
                reason: e.to_string(),
            })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Downstream connection closed with error");
            }
        });

        receipt.mark_sent();
        let response = sender
            .send_request(outbound)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let (parts, incoming) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(incoming), self.max_response_bytes)
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(DownstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use std::time::Duration;

    fn request(url: &str) -> OutboundRequest {
        OutboundRequest {
            method: Method::GET,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: Default::default(),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_invalid_target_is_not_sent() {
        let receipt = SendReceipt::new();
        let err = HttpTransport::new()
            .send(&request("ftp://records/x"), &receipt)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InvalidTarget { .. }));
        assert!(!err.is_retryable());
        assert!(!receipt.is_sent());
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_sent() {
        // Bind then drop a listener to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let receipt = SendReceipt::new();
        let err = HttpTransport::new()
            .send(&request(&format!("http://{}/x", addr)), &receipt)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.is_retryable());
        assert!(!receipt.is_sent());
    }
}
