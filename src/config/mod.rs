//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve {{service}} placeholders)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → route registry and pipeline built from it at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes and breakers live for the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{finalize_config, load_config, ConfigError};
pub use schema::{
    AppConfig, BreakerConfig, DatabaseConfig, ListenerConfig, ObservabilityConfig,
    PipelineConfig, RetryConfig, RouteConfig, SqlStatement, StatementsConfig,
};
