//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger()
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting and drains
//!             → directory source finishes the current batch and exits
//! ```
//!
//! # Design Decisions
//! - One coordinator per process, cloned into every long-running task
//! - A batch in progress is never interrupted; the loop exits between batches

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
