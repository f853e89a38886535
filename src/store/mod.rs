//! Stores and lookup services for the batch pipeline.
//!
//! - `memory`: process-local tables, for tests and runs without a database
//! - `postgres`: sqlx-backed adapters driven by configured statements

pub mod memory;
pub mod postgres;

pub use memory::{MemoryLookups, MemoryStore};
pub use postgres::{PgLookups, PgStore};
