//! Integration gateway library.
//!
//! Two engines share this crate: a resilient request gateway (per-route
//! circuit breakers, bounded retries, timeouts, fixed fallbacks) and a
//! transactional batch-enrichment pipeline (parallel lookups,
//! deterministic merge, all-or-nothing writes).

// Gateway
pub mod config;
pub mod gateway;
pub mod http;
pub mod routing;
pub mod transport;

// Batch pipeline
pub mod pipeline;
pub mod store;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::BatchPipeline;
