//! Retry logic.
//!
//! # Responsibilities
//! - Perform up to `retry_count` attempts of one downstream call
//! - Bound every attempt by the route's deadline
//! - Refuse to re-send a request that already left the process unless the
//!   route allows it (non-idempotent calls must not be duplicated)
//! - Back off with jitter between attempts
//!
//! # Design Decisions
//! - Only a 2xx answer is a success. Connection errors, timeouts and any
//!   other status are failed attempts, retryable within the send guard
//! - An invalid target is never retried
//! - The invoker knows nothing about circuit breakers; the caller records
//!   one outcome per logical call

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff;
use crate::resilience::timeouts::with_deadline;
use crate::routing::RouteSpec;
use crate::transport::{DownstreamResponse, OutboundRequest, SendReceipt, Transport};

/// Why a logical call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The last attempt exceeded its deadline.
    Timeout,
    /// Connection or protocol failure.
    Transport,
    /// Failure after a confirmed send with retry disallowed, or a failure
    /// no retry could fix.
    NonRetryable,
    /// The downstream answered with a status outside 2xx.
    Status(u16),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Transport => write!(f, "transport"),
            FailureReason::NonRetryable => write!(f, "non_retryable"),
            FailureReason::Status(status) => write!(f, "status_{}", status),
        }
    }
}

/// Terminal failure of a logical call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {detail}")]
pub struct InvocationFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl InvocationFailure {
    fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Outcome of one logical call.
#[derive(Debug)]
pub struct InvocationResult {
    /// Attempts actually issued, never more than the route's budget.
    pub attempts: u32,
    pub outcome: Result<DownstreamResponse, InvocationFailure>,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.outcome.as_ref().err().map(|f| f.reason)
    }
}

/// Bounded-retry wrapper around a transport.
#[derive(Debug, Clone)]
pub struct RetryingInvoker {
    transport: Arc<dyn Transport>,
    backoff: RetryConfig,
}

impl RetryingInvoker {
    pub fn new(transport: Arc<dyn Transport>, backoff: RetryConfig) -> Self {
        Self { transport, backoff }
    }

    pub async fn invoke(&self, spec: &RouteSpec, request: &OutboundRequest) -> InvocationResult {
        let max_attempts = spec.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics::record_attempt(&spec.name);

            let receipt = SendReceipt::new();
            let failure = match with_deadline(spec.timeout, self.transport.send(request, &receipt)).await {
                Ok(Ok(response)) if !response.status.is_success() => InvocationFailure::new(
                    FailureReason::Status(response.status.as_u16()),
                    format!("downstream answered {}", response.status),
                ),
                Ok(Ok(response)) => {
                    return InvocationResult {
                        attempts: attempt,
                        outcome: Ok(response),
                    };
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    return InvocationResult {
                        attempts: attempt,
                        outcome: Err(InvocationFailure::new(FailureReason::NonRetryable, e.to_string())),
                    };
                }
                Ok(Err(e)) => InvocationFailure::new(FailureReason::Transport, e.to_string()),
                Err(elapsed) => InvocationFailure::new(FailureReason::Timeout, elapsed.to_string()),
            };

            if receipt.is_sent() && !spec.allow_retry_after_send {
                tracing::warn!(
                    route = %spec.name,
                    attempt,
                    reason = %failure.reason,
                    error = %failure.detail,
                    "Request was sent before failing, not retrying"
                );
                return InvocationResult {
                    attempts: attempt,
                    outcome: Err(InvocationFailure::new(
                        FailureReason::NonRetryable,
                        format!("{} (after request was sent)", failure),
                    )),
                };
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    route = %spec.name,
                    attempts = attempt,
                    reason = %failure.reason,
                    error = %failure.detail,
                    "Retry budget exhausted"
                );
                return InvocationResult {
                    attempts: attempt,
                    outcome: Err(failure),
                };
            }

            let delay = backoff::delay_for(&self.backoff, attempt);
            tracing::info!(
                route = %spec.name,
                attempt,
                delay = ?delay,
                reason = %failure.reason,
                error = %failure.detail,
                "Retrying downstream call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::transport::testing::{ScriptedTransport, Step};
    use axum::http::{HeaderMap, Method};
    use std::time::Duration;

    fn spec(retry_count: u32, allow_retry_after_send: bool) -> RouteSpec {
        let mut config = RouteConfig::new(
            "appointments",
            "GET",
            "/appointments/{patientId}",
            "http://pm:8080/practice-management/appointment/{patientId}",
            "Unable to retrieve appointments. Please try again later.",
        );
        config.retry_count = retry_count;
        config.allow_retry_after_send = allow_retry_after_send;
        RouteSpec::from_config(&config).unwrap()
    }

    fn request() -> OutboundRequest {
        OutboundRequest {
            method: Method::GET,
            url: "http://pm:8080/practice-management/appointment/42".to_string(),
            headers: HeaderMap::new(),
            body: Default::default(),
            timeout: Duration::from_millis(1500),
        }
    }

    fn invoker(transport: Arc<ScriptedTransport>) -> RetryingInvoker {
        RetryingInvoker::new(
            transport,
            RetryConfig {
                base_delay_ms: 10,
                max_delay_ms: 50,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_connect_failures() {
        let transport = Arc::new(ScriptedTransport::new([
            Step::FailBeforeSend,
            Step::FailBeforeSend,
            Step::Respond(200, "slots"),
        ]));

        let result = invoker(transport.clone()).invoke(&spec(5, false), &request()).await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(transport.calls(), 3);
        assert_eq!(&result.outcome.unwrap().body[..], b"slots");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_retry_budget() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::FailBeforeSend; 10]));

        let result = invoker(transport.clone()).invoke(&spec(4, false), &request()).await;

        assert_eq!(result.attempts, 4);
        assert_eq!(transport.calls(), 4);
        assert_eq!(result.failure_reason(), Some(FailureReason::Transport));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retry_count_still_attempts_once() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::FailBeforeSend; 3]));

        let result = invoker(transport.clone()).invoke(&spec(0, false), &request()).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_after_send_when_disallowed() {
        let transport = Arc::new(ScriptedTransport::new([Step::FailAfterSend, Step::Respond(200, "ok")]));

        let result = invoker(transport.clone()).invoke(&spec(5, false), &request()).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(transport.calls(), 1);
        assert_eq!(result.failure_reason(), Some(FailureReason::NonRetryable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_send_when_allowed() {
        let transport = Arc::new(ScriptedTransport::new([Step::FailAfterSend, Step::Respond(200, "ok")]));

        let result = invoker(transport.clone()).invoke(&spec(5, true), &request()).await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_each_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Stall { sent: false }; 3]));
        let started = tokio::time::Instant::now();

        let result = invoker(transport.clone()).invoke(&spec(3, false), &request()).await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.failure_reason(), Some(FailureReason::Timeout));
        // Three 1500ms deadlines plus two short backoffs, nowhere near the stall.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_send_is_terminal() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Stall { sent: true }; 3]));

        let result = invoker(transport.clone()).invoke(&spec(5, false), &request()).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(result.failure_reason(), Some(FailureReason::NonRetryable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_when_allowed() {
        let transport = Arc::new(ScriptedTransport::new([
            Step::Respond(503, "busy"),
            Step::Respond(503, "busy"),
        ]));

        let result = invoker(transport.clone()).invoke(&spec(2, true), &request()).await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.failure_reason(), Some(FailureReason::Status(503)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_failures() {
        let transport = Arc::new(ScriptedTransport::new([Step::Respond(404, "no such patient")]));

        let result = invoker(transport.clone()).invoke(&spec(5, false), &request()).await;

        assert_eq!(result.attempts, 1, "a received answer is never re-sent by default");
        assert_eq!(result.failure_reason(), Some(FailureReason::NonRetryable));
        assert!(result.outcome.unwrap_err().detail.contains("404"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_success_statuses_retried_when_allowed() {
        let transport = Arc::new(ScriptedTransport::new([
            Step::Respond(404, "no such patient"),
            Step::Respond(302, "elsewhere"),
            Step::Respond(200, "found"),
        ]));

        let result = invoker(transport.clone()).invoke(&spec(5, true), &request()).await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_target_not_retried() {
        let transport = Arc::new(ScriptedTransport::new([Step::InvalidTarget]));

        let result = invoker(transport.clone()).invoke(&spec(5, true), &request()).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(result.failure_reason(), Some(FailureReason::NonRetryable));
    }
}
