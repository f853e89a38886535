//! Inbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, limits)
//!     → request.rs (buffer into InboundRequest)
//!     → gateway (route, breaker, retries, fallback)
//!     → response.rs (GatewayResponse / GatewayError → HTTP)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
