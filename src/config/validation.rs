//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (targets reference known services and
//!   only path parameters the inbound template captures)
//! - Validate value ranges (timeouts > 0, status codes, thresholds)
//! - Detect conflicting routes
//! - Keep the listener's request timeout above every route's worst-case
//!   call, so callers get the route fallback rather than a listener timeout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::{AppConfig, RetryConfig, RouteConfig};
use crate::routing::matcher::PathTemplate;
use crate::routing::target::TargetTemplate;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration whose service placeholders are resolved.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be >= 1"));
    }
    if config.breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.reset_timeout_ms", "must be > 0"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let mut names = HashSet::new();
    let mut endpoints = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate route name '{}'", route.name),
            ));
        }
        if !endpoints.insert((route.method.to_uppercase(), route.path.as_str())) {
            errors.push(ValidationError::new(
                format!("{}.path", field),
                format!("{} {} is defined twice", route.method, route.path),
            ));
        }
        validate_route(&field, route, &mut errors);

        let worst_case_ms = worst_case_call_ms(route, &config.retries);
        if config.listener.request_timeout_secs.saturating_mul(1000) <= worst_case_ms {
            errors.push(ValidationError::new(
                "listener.request_timeout_secs",
                format!(
                    "{}s does not cover route '{}', which may take up to {}ms",
                    config.listener.request_timeout_secs, route.name, worst_case_ms
                ),
            ));
        }
    }

    let pipeline = &config.pipeline;
    if pipeline.file_extension.trim().is_empty() {
        errors.push(ValidationError::new("pipeline.file_extension", "must not be empty"));
    }
    if pipeline.poll_interval_ms == 0 {
        errors.push(ValidationError::new("pipeline.poll_interval_ms", "must be > 0"));
    }
    if pipeline.separator == '\n' || pipeline.separator == '\r' {
        errors.push(ValidationError::new("pipeline.separator", "must not be a line break"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest a logical call on `route` can take: every attempt at its deadline
/// plus the largest backoff between attempts (delay cap plus 10% jitter).
pub fn worst_case_call_ms(route: &RouteConfig, retries: &RetryConfig) -> u64 {
    let attempts = route.retry_count.max(1);
    let mut total = route.timeout_ms.saturating_mul(u64::from(attempts));
    for attempt in 1..attempts {
        let exponential = retries
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt - 1))
            .min(retries.max_delay_ms);
        total = total.saturating_add(exponential + exponential / 10);
    }
    total
}

fn validate_route(field: &str, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if route.name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
    }
    if Method::from_bytes(route.method.to_uppercase().as_bytes()).is_err() {
        errors.push(ValidationError::new(
            format!("{}.method", field),
            format!("'{}' is not an HTTP method", route.method),
        ));
    }

    let path = match PathTemplate::parse(&route.path) {
        Ok(path) => Some(path),
        Err(e) => {
            errors.push(ValidationError::new(format!("{}.path", field), e.to_string()));
            None
        }
    };

    if route.target.contains("{{") {
        errors.push(ValidationError::new(
            format!("{}.target", field),
            format!("unresolved service placeholder in '{}'", route.target),
        ));
    } else {
        match TargetTemplate::parse(&route.target) {
            Ok(target) => {
                if let Some(path) = &path {
                    for param in target.params() {
                        if !path.params().any(|p| p == param) {
                            errors.push(ValidationError::new(
                                format!("{}.target", field),
                                format!("parameter '{}' is not captured by '{}'", param, route.path),
                            ));
                        }
                    }
                }
            }
            Err(e) => {
                errors.push(ValidationError::new(format!("{}.target", field), e.to_string()));
            }
        }
    }

    if route.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{}.timeout_ms", field), "must be > 0"));
    }
    if !(100..=599).contains(&route.fallback_status) {
        errors.push(ValidationError::new(
            format!("{}.fallback_status", field),
            format!("{} is not an HTTP status code", route.fallback_status),
        ));
    }
    if route.fallback_message.is_empty() {
        errors.push(ValidationError::new(
            format!("{}.fallback_message", field),
            "must not be empty",
        ));
    }
    if route.failure_threshold == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.failure_threshold", field),
            "must be >= 1",
        ));
    }
    if route.reset_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.reset_timeout_ms", field),
            "must be > 0",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::finalize_config;

    #[test]
    fn test_default_config_is_valid() {
        assert!(finalize_config(AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.breaker.failure_threshold = 0;
        config.routes[0].timeout_ms = 0;
        config.routes[1].fallback_status = 42;
        crate::config::loader::resolve_services(&mut config);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"breaker.failure_threshold"));
        assert!(fields.contains(&"routes[0].timeout_ms"));
        assert!(fields.contains(&"routes[1].fallback_status"));
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let mut config = AppConfig::default();
        let copy = config.routes[0].clone();
        config.routes.push(copy);
        crate::config::loader::resolve_services(&mut config);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate route name")));
        assert!(errors.iter().any(|e| e.message.contains("defined twice")));
    }

    #[test]
    fn test_worst_case_call_under_defaults() {
        let config = AppConfig::default();
        // 5 × 1500ms plus backoffs of 25, 50, 100 and 200ms with jitter.
        assert_eq!(worst_case_call_ms(&config.routes[0], &config.retries), 7500 + 412);
    }

    #[test]
    fn test_request_timeout_must_cover_route_retries() {
        let mut config = AppConfig::default();
        config.listener.request_timeout_secs = 5;
        crate::config::loader::resolve_services(&mut config);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), config.routes.len());
        assert!(errors
            .iter()
            .all(|e| e.field == "listener.request_timeout_secs"));
        assert!(errors[0].message.contains("appointments"));

        config.listener.request_timeout_secs = 8;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_target_param_must_be_captured() {
        let mut config = AppConfig::default();
        config.routes[2].target = "http://svc:8080/availability/{patientId}".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "routes[2].target" && e.message.contains("patientId")));
    }
}
