//! Resilient request gateway.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → dispatch(): RouteRegistry match (method + path → entry, params)
//!     → handle(): content-type check, downstream URL from target template
//!     → CircuitBreaker::allow()
//!         None   → FallbackPolicy (no downstream call, no retry consumed)
//!         permit → RetryingInvoker::invoke()
//!                   ok   → permit.record_success → downstream status/body unchanged
//!                   fail → permit.record_failure → FallbackPolicy
//! ```
//!
//! # Design Decisions
//! - Exactly one breaker outcome per admitted call, however many attempts
//! - Failure causes are logged, never returned to the caller
//! - Hop-by-hop headers are not forwarded; `x-request-id` is

pub mod error;
pub mod response;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderMap, HeaderName};

use crate::config::AppConfig;
use crate::observability::metrics;
use crate::resilience::RetryingInvoker;
use crate::routing::{RouteEntry, RouteMatch, RouteRegistry, TemplateError};
use crate::transport::{DownstreamResponse, OutboundRequest, Transport};

pub use error::GatewayError;
pub use response::{GatewayResponse, InboundRequest};

/// Headers that describe the inbound connection rather than the request.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
];

#[derive(Debug, Clone)]
pub struct Gateway {
    registry: Arc<RouteRegistry>,
    invoker: RetryingInvoker,
}

impl Gateway {
    pub fn new(registry: RouteRegistry, invoker: RetryingInvoker) -> Self {
        Self {
            registry: Arc::new(registry),
            invoker,
        }
    }

    /// Build the registry from configuration and invoke through `transport`.
    pub fn from_config(config: &AppConfig, transport: Arc<dyn Transport>) -> Result<Self, TemplateError> {
        let registry = RouteRegistry::from_config(config)?;
        let invoker = RetryingInvoker::new(transport, config.retries.clone());
        Ok(Self::new(registry, invoker))
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Route an inbound request by method and path, then handle it.
    pub async fn dispatch(&self, mut request: InboundRequest) -> Result<GatewayResponse, GatewayError> {
        match self.registry.match_request(&request.method, &request.path) {
            RouteMatch::Found(entry, params) => {
                request.params = params;
                self.handle_entry(&entry, request).await
            }
            RouteMatch::MethodNotAllowed => Err(GatewayError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path,
            }),
            RouteMatch::NotFound => Err(GatewayError::NoMatch {
                method: request.method.to_string(),
                path: request.path,
            }),
        }
    }

    /// Forward `request` through the named route. `request.params` must hold
    /// every parameter the route's target references.
    pub async fn handle(&self, route_name: &str, request: InboundRequest) -> Result<GatewayResponse, GatewayError> {
        let entry = self
            .registry
            .get(route_name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownRoute(route_name.to_string()))?;
        self.handle_entry(&entry, request).await
    }

    async fn handle_entry(&self, entry: &RouteEntry, request: InboundRequest) -> Result<GatewayResponse, GatewayError> {
        let start = Instant::now();
        let route = entry.spec.name.as_str();

        if let Some(expected) = &entry.spec.consumes {
            if !content_type_matches(&request.headers, expected) {
                return Err(GatewayError::UnsupportedMediaType {
                    route: route.to_string(),
                    expected: expected.clone(),
                });
            }
        }

        let outbound = build_outbound(entry, request)?;

        match self.forward(entry, &outbound).await {
            Ok(response) => {
                tracing::debug!(route = %route, status = %response.status, "Downstream call succeeded");
                metrics::record_request(route, response.status.as_u16(), "success", start);
                Ok(GatewayResponse::from_downstream(response))
            }
            Err(e) => {
                let outcome = match e {
                    GatewayError::BreakerOpen(_) => "rejected",
                    _ => "fallback",
                };
                tracing::warn!(route = %route, error = %e, "Answering with fallback");
                let response = entry.fallback.respond();
                metrics::record_request(route, response.status.as_u16(), outcome, start);
                Ok(response)
            }
        }
    }

    async fn forward(&self, entry: &RouteEntry, outbound: &OutboundRequest) -> Result<DownstreamResponse, GatewayError> {
        let Some(permit) = entry.breaker.allow() else {
            return Err(GatewayError::BreakerOpen(entry.spec.name.clone()));
        };

        // The downstream call runs outside any lock. If this future is
        // dropped mid-call, the permit reports a lost trial on drop.
        let result = self.invoker.invoke(&entry.spec, outbound).await;
        match result.outcome {
            Ok(response) => {
                permit.record_success();
                Ok(response)
            }
            Err(failure) => {
                permit.record_failure();
                Err(GatewayError::Invocation {
                    route: entry.spec.name.clone(),
                    attempts: result.attempts,
                    failure,
                })
            }
        }
    }
}

fn build_outbound(entry: &RouteEntry, request: InboundRequest) -> Result<OutboundRequest, GatewayError> {
    let mut url = entry
        .spec
        .downstream_target
        .expand(&request.params)
        .map_err(|source| GatewayError::Target {
            route: entry.spec.name.clone(),
            source,
        })?;
    if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }

    Ok(OutboundRequest {
        method: entry.spec.method.clone(),
        url,
        headers: forwardable_headers(&request.headers),
        body: request.body,
        timeout: entry.spec.timeout,
    })
}

/// Copy request headers minus hop-by-hop ones, including any the
/// `Connection` header names.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive" {
            continue;
        }
        if listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

fn content_type_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}
