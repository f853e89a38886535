//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to downstream:
//!     → circuit_breaker.rs (allow? otherwise fail fast)
//!     → retries.rs (bounded attempts, send guard, backoff.rs between attempts)
//!     → timeouts.rs (deadline per attempt)
//!     → circuit_breaker.rs (one success/failure per logical call)
//!     → fallback.rs (fixed response when the call failed or was rejected)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - A request confirmed sent is only re-sent when the route allows it
//! - Retries are invisible to the breaker's failure accounting
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod fallback;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPhase, BreakerSettings, BreakerSnapshot, CallPermit, CircuitBreaker};
pub use fallback::FallbackPolicy;
pub use retries::{FailureReason, InvocationFailure, InvocationResult, RetryingInvoker};
