//! Route registry and lookup.
//!
//! # Responsibilities
//! - Own one `RouteEntry` per configured route: spec, breaker, fallback
//! - Look up entries by name and by inbound method + path
//! - Report breaker state for every route
//!
//! # Design Decisions
//! - Immutable after construction; only breaker state inside entries changes,
//!   behind each breaker's own lock
//! - First match in configuration order wins
//! - Explicit NotFound / MethodNotAllowed rather than a silent default

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;

use crate::config::AppConfig;
use crate::resilience::{BreakerSettings, BreakerSnapshot, CircuitBreaker, FallbackPolicy};
use crate::routing::matcher::{PathParams, TemplateError};
use crate::routing::spec::RouteSpec;

/// Everything the gateway needs for one route.
#[derive(Debug)]
pub struct RouteEntry {
    pub spec: RouteSpec,
    pub breaker: CircuitBreaker,
    pub fallback: FallbackPolicy,
}

impl RouteEntry {
    pub fn new(spec: RouteSpec, settings: BreakerSettings) -> Self {
        Self {
            breaker: CircuitBreaker::new(spec.name.clone(), settings),
            fallback: FallbackPolicy::from_spec(&spec),
            spec,
        }
    }
}

/// Result of matching an inbound request.
#[derive(Debug)]
pub enum RouteMatch {
    Found(Arc<RouteEntry>, PathParams),
    MethodNotAllowed,
    NotFound,
}

#[derive(Debug, Default)]
pub struct RouteRegistry {
    entries: Vec<Arc<RouteEntry>>,
    by_name: HashMap<String, usize>,
}

impl RouteRegistry {
    /// Compile all configured routes, each with its own breaker.
    pub fn from_config(config: &AppConfig) -> Result<Self, TemplateError> {
        let mut registry = Self::default();
        for route in &config.routes {
            let settings = BreakerSettings {
                failure_threshold: route.failure_threshold.unwrap_or(config.breaker.failure_threshold),
                reset_timeout: Duration::from_millis(
                    route.reset_timeout_ms.unwrap_or(config.breaker.reset_timeout_ms),
                ),
            };
            registry.insert(RouteEntry::new(RouteSpec::from_config(route)?, settings));
        }
        Ok(registry)
    }

    /// Add a route. A later route with the same name replaces the lookup
    /// by name but keeps its place for path matching.
    pub fn insert(&mut self, entry: RouteEntry) {
        self.by_name.insert(entry.spec.name.clone(), self.entries.len());
        self.entries.push(Arc::new(entry));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RouteEntry>> {
        self.by_name.get(name).and_then(|&i| self.entries.get(i))
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn match_request(&self, method: &Method, path: &str) -> RouteMatch {
        let mut path_matched = false;
        for entry in &self.entries {
            if let Some(params) = entry.spec.path.match_path(path) {
                if entry.spec.method == *method {
                    return RouteMatch::Found(entry.clone(), params);
                }
                path_matched = true;
            }
        }
        if path_matched {
            RouteMatch::MethodNotAllowed
        } else {
            RouteMatch::NotFound
        }
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.entries.iter().map(|e| e.breaker.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::finalize_config;

    fn registry() -> RouteRegistry {
        let config = finalize_config(AppConfig::default()).unwrap();
        RouteRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn test_default_routes() {
        let registry = registry();
        assert_eq!(registry.len(), 5);
        for name in ["appointments", "results", "availability", "schedule", "prescriptions"] {
            assert!(registry.get(name).is_some(), "missing route {}", name);
        }
    }

    #[test]
    fn test_match_request() {
        let registry = registry();

        match registry.match_request(&Method::GET, "/prescriptions/7") {
            RouteMatch::Found(entry, params) => {
                assert_eq!(entry.spec.name, "prescriptions");
                assert_eq!(params.get("patientId").map(String::as_str), Some("7"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            registry.match_request(&Method::POST, "/schedule"),
            RouteMatch::Found(_, _)
        ));
        assert!(matches!(
            registry.match_request(&Method::GET, "/schedule"),
            RouteMatch::MethodNotAllowed
        ));
        assert!(matches!(
            registry.match_request(&Method::GET, "/billing"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn test_each_route_has_its_own_breaker() {
        let registry = registry();
        let appointments = registry.get("appointments").unwrap();
        for _ in 0..5 {
            appointments.breaker.allow().unwrap().record_failure();
        }

        assert!(appointments.breaker.allow().is_none());
        assert!(registry.get("results").unwrap().breaker.allow().is_some());
    }

    #[test]
    fn test_route_breaker_overrides() {
        let mut config = AppConfig::default();
        config.breaker.failure_threshold = 7;
        config.routes[1].failure_threshold = Some(2);
        let config = finalize_config(config).unwrap();
        let registry = RouteRegistry::from_config(&config).unwrap();

        assert_eq!(registry.get("appointments").unwrap().breaker.settings().failure_threshold, 7);
        assert_eq!(registry.get("results").unwrap().breaker.settings().failure_threshold, 2);
    }
}
