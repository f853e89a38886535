//! Compiled route definition.

use std::time::Duration;

use axum::http::Method;

use crate::config::RouteConfig;
use crate::routing::matcher::{PathTemplate, TemplateError};
use crate::routing::target::TargetTemplate;

/// One gateway route, compiled from configuration at startup and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub name: String,
    pub method: Method,
    pub path: PathTemplate,
    pub downstream_target: TargetTemplate,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Maximum attempts per logical call.
    pub retry_count: u32,
    pub allow_retry_after_send: bool,
    pub fallback_message: String,
    pub fallback_status: u16,
    pub consumes: Option<String>,
}

impl RouteSpec {
    pub fn from_config(config: &RouteConfig) -> Result<Self, TemplateError> {
        // Method is checked by config validation; GET is only a safe default
        // for programmatic configs that skipped it.
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes()).unwrap_or(Method::GET);

        Ok(Self {
            name: config.name.clone(),
            method,
            path: PathTemplate::parse(&config.path)?,
            downstream_target: TargetTemplate::parse(&config.target)?,
            timeout: Duration::from_millis(config.timeout_ms),
            retry_count: config.retry_count,
            allow_retry_after_send: config.allow_retry_after_send,
            fallback_message: config.fallback_message.clone(),
            fallback_status: config.fallback_status,
            consumes: config.consumes.clone(),
        })
    }

    /// Number of attempts one logical call may make. A call is always
    /// attempted at least once.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = RouteConfig::new(
            "results",
            "get",
            "/results/{patientId}",
            "http://records:8080/medical-records/results/{patientId}",
            "Unable to retrieve lab results. Please try again later.",
        );
        config.retry_count = 0;

        let spec = RouteSpec::from_config(&config).unwrap();
        assert_eq!(spec.method, Method::GET);
        assert_eq!(spec.timeout, Duration::from_millis(1500));
        assert_eq!(spec.max_attempts(), 1);
        assert_eq!(spec.fallback_status, 504);
    }
}
