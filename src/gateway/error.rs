//! Gateway error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::InvocationFailure;
use crate::routing::TemplateError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    #[error("no route matches {method} {path}")]
    NoMatch { method: String, path: String },

    #[error("{method} is not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("route '{route}' only accepts {expected}")]
    UnsupportedMediaType { route: String, expected: String },

    #[error("cannot build downstream request for route '{route}': {source}")]
    Target {
        route: String,
        #[source]
        source: TemplateError,
    },

    #[error("circuit open for route '{0}'")]
    BreakerOpen(String),

    #[error("route '{route}' failed after {attempts} attempt(s): {failure}")]
    Invocation {
        route: String,
        attempts: u32,
        failure: InvocationFailure,
    },
}

impl GatewayError {
    /// Status for errors that reach the inbound caller. Breaker and
    /// invocation failures are answered with the route fallback instead.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UnknownRoute(_) | GatewayError::NoMatch { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::Target { .. } => StatusCode::BAD_REQUEST,
            GatewayError::BreakerOpen(_) | GatewayError::Invocation { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
