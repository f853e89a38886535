//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! RetryingInvoker (one attempt)
//!     → Transport::send(request, receipt)
//!     → http.rs: connect → handshake → receipt.mark_sent() → write request
//!     → DownstreamResponse (status, headers, buffered body) or TransportError
//! ```
//!
//! # Design Decisions
//! - The transport reports whether the request left the process through a
//!   per-attempt `SendReceipt`, so the invoker can refuse to re-send
//!   non-idempotent calls
//! - Connect failures are distinguishable from failures after sending
//! - Deadlines are enforced by the caller; a cancelled attempt simply drops
//!   the in-flight future

pub mod http;
#[cfg(test)]
pub mod testing;

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

pub use http::HttpTransport;

/// A fully resolved downstream request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Absolute `http://` URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Deadline the invoker applies to each attempt, for adapters that want
    /// to bound their own phases.
    pub timeout: Duration,
}

/// A buffered downstream response.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Records whether a request was confirmed sent during one attempt.
#[derive(Debug, Default)]
pub struct SendReceipt {
    sent: AtomicBool,
}

impl SendReceipt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the transport once the request is about to leave the process.
    pub fn mark_sent(&self) {
        self.sent.store(true, Ordering::Release);
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }
}

/// Transport-level failure of one attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("connect to {authority} failed: {reason}")]
    Connect { authority: String, reason: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("reading response body failed: {0}")]
    Body(String),
}

impl TransportError {
    /// Whether another attempt could possibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidTarget { .. })
    }
}

/// Sends one request to a downstream service.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(
        &self,
        request: &OutboundRequest,
        receipt: &SendReceipt,
    ) -> Result<DownstreamResponse, TransportError>;
}
