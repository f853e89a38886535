//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! and the batch pipeline. All types derive Serde traits for deserialization
//! from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Named downstream service locations, referenced from route targets
    /// as `{{name}}`.
    pub services: HashMap<String, String>,

    /// Gateway route definitions.
    pub routes: Vec<RouteConfig>,

    /// Default circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Backoff between retry attempts.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Batch enrichment pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let services = [
            ("practice-management-svc", "http://practice-management:8080"),
            ("medical-records-svc", "http://medical-records:8080"),
            ("scheduling-svc", "http://inbound-rest-jms:8080"),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();

        Self {
            listener: ListenerConfig::default(),
            services,
            routes: default_routes(),
            breaker: BreakerConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// The fixed inbound surface of the patient registration gateway.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new(
            "appointments",
            "GET",
            "/appointments/{patientId}",
            "{{practice-management-svc}}/practice-management/appointment/{patientId}",
            "Unable to retrieve appointments. Please try again later.",
        ),
        RouteConfig::new(
            "results",
            "GET",
            "/results/{patientId}",
            "{{medical-records-svc}}/medical-records/results/{patientId}",
            "Unable to retrieve lab results. Please try again later.",
        ),
        RouteConfig::new(
            "availability",
            "GET",
            "/availability",
            "{{practice-management-svc}}/practice-management/availability",
            "Unable to retrieve free appointment slots. Please try again later.",
        ),
        RouteConfig {
            consumes: Some("application/json".to_string()),
            ..RouteConfig::new(
                "schedule",
                "POST",
                "/schedule",
                "{{scheduling-svc}}/appointment",
                "Unable to schedule an appointment. Please try again later.",
            )
        },
        RouteConfig::new(
            "prescriptions",
            "GET",
            "/prescriptions/{patientId}",
            "{{medical-records-svc}}/medical-records/prescriptions/{patientId}",
            "Unable to get prescriptions. Please try again later.",
        ),
    ]
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,

    /// Outer bound on the whole inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

/// One gateway route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Inbound HTTP method.
    #[serde(default = "default_method")]
    pub method: String,

    /// Inbound path template, e.g. `/appointments/{patientId}`.
    pub path: String,

    /// Downstream URL template. `{{service}}` is resolved at load time,
    /// `{param}` per request from the inbound path.
    pub target: String,

    /// Per-attempt deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of attempts for one logical call.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Whether a request that already left the process may be re-sent.
    #[serde(default)]
    pub allow_retry_after_send: bool,

    /// Fixed body returned when the route fails or its breaker is open.
    pub fallback_message: String,

    /// Fixed status returned with the fallback body.
    #[serde(default = "default_fallback_status")]
    pub fallback_status: u16,

    /// Required inbound content type, if any.
    #[serde(default)]
    pub consumes: Option<String>,

    /// Overrides `breaker.failure_threshold` for this route.
    #[serde(default)]
    pub failure_threshold: Option<u32>,

    /// Overrides `breaker.reset_timeout_ms` for this route.
    #[serde(default)]
    pub reset_timeout_ms: Option<u64>,
}

impl RouteConfig {
    /// Route with the gateway defaults (1500ms timeout, 5 attempts, no
    /// retry after send, 504 fallback).
    pub fn new(name: &str, method: &str, path: &str, target: &str, fallback_message: &str) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            target: target.to_string(),
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            allow_retry_after_send: false,
            fallback_message: fallback_message.to_string(),
            fallback_status: default_fallback_status(),
            consumes: None,
            failure_threshold: None,
            reset_timeout_ms: None,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    1500
}

fn default_retry_count() -> u32 {
    5
}

fn default_fallback_status() -> u16 {
    504
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failed calls that open the breaker.
    pub failure_threshold: u32,

    /// Time the breaker stays open before admitting a trial call.
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 5000,
        }
    }
}

/// Retry backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 25,
            max_delay_ms: 500,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Batch pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for incoming batch files.
    pub inbox_dir: String,

    /// Where successfully processed files are moved.
    pub done_dir: String,

    /// Where files of failed batches are moved.
    pub error_dir: String,

    /// Only files with this extension are picked up.
    pub file_extension: String,

    /// Inbox rescan interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Field separator.
    pub separator: char,

    /// Skip the first line of every file.
    pub skip_header: bool,

    /// Relational store settings; `ingest` requires a URL.
    pub database: DatabaseConfig,

    /// SQL statements for lookups and writes.
    pub statements: StatementsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inbox_dir: "data/inbox".to_string(),
            done_dir: "data/inbox/.done".to_string(),
            error_dir: "data/inbox/.error".to_string(),
            file_extension: "csv".to_string(),
            poll_interval_ms: 5000,
            separator: ',',
            skip_header: false,
            database: DatabaseConfig::default(),
            statements: StatementsConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: Option<String>,

    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// A SQL statement with positional parameters bound from record keys.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SqlStatement {
    /// Statement text using `$1`, `$2`, ... placeholders.
    pub sql: String,

    /// Record keys bound to the placeholders, in order.
    #[serde(default)]
    pub params: Vec<String>,
}

impl SqlStatement {
    fn new(sql: &str, params: &[&str]) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Statements used by the PostgreSQL adapters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatementsConfig {
    pub select_supplier: SqlStatement,
    pub select_item: SqlStatement,
    pub update_stock_level: SqlStatement,
    pub insert_shipment: SqlStatement,
}

impl Default for StatementsConfig {
    fn default() -> Self {
        Self {
            select_supplier: SqlStatement::new(
                r#"SELECT id AS "supplierId" FROM supplier WHERE code = $1"#,
                &["supplierCode"],
            ),
            select_item: SqlStatement::new(
                r#"SELECT id AS "itemId" FROM item WHERE code = $1"#,
                &["itemCode"],
            ),
            update_stock_level: SqlStatement::new(
                "UPDATE stock_level SET quantity = quantity + $1 WHERE item_id = $2",
                &["quantity", "itemId"],
            ),
            insert_shipment: SqlStatement::new(
                "INSERT INTO shipment (code, supplier_id, item_id, quantity, shipment_date) \
                 VALUES ($1, $2, $3, $4, $5::date)",
                &["shipmentCode", "supplierId", "itemId", "quantity", "shipmentDate"],
            ),
        }
    }
}
