//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup in configuration order)
//!     → matcher.rs (evaluate path template, capture parameters)
//!     → Return: matched RouteEntry + params, or NotFound/MethodNotAllowed
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → spec.rs (RouteSpec: path template, target template, limits)
//!     → one CircuitBreaker + FallbackPolicy per route
//!     → Freeze as immutable RouteRegistry
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;
pub mod spec;
pub mod target;

pub use matcher::{PathParams, PathTemplate, TemplateError};
pub use router::{RouteEntry, RouteMatch, RouteRegistry};
pub use spec::RouteSpec;
pub use target::TargetTemplate;
