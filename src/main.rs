//! Integration gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                  INTEGRATION GATEWAY                 │
//!                    │                                                      │
//!   Client Request   │  ┌────────┐   ┌─────────┐   ┌─────────┐   ┌────────┐ │
//!   ─────────────────┼─▶│  http  │──▶│ routing │──▶│ breaker │──▶│ retry  │─┼──▶ Downstream
//!                    │  │ server │   │registry │   │         │   │timeout │ │    service
//!                    │  └────────┘   └─────────┘   └────┬────┘   └────────┘ │
//!   Fallback or      │                                  ▼                   │
//!   downstream ◀─────┼────────────────────────── fallback policy            │
//!   response         │                                                      │
//!                    │  ┌────────┐   ┌──────────────┐   ┌─────────────────┐ │
//!   Inbox files ─────┼─▶│ source │──▶│ parse→enrich │──▶│ one transaction │─┼──▶ Store
//!                    │  └────────┘   │ (2 lookups)  │   │   per batch     │ │
//!                    │               └──────────────┘   └─────────────────┘ │
//!                    └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Commands
//! - `serve` (default): run the gateway listener
//! - `ingest [--once]`: run the batch pipeline over the inbox
//! - `check`: load and validate the configuration, then exit

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use integration_gateway::config::{finalize_config, load_config, AppConfig};
use integration_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use integration_gateway::observability::{logging, metrics};
use integration_gateway::pipeline::{BatchPipeline, DirectorySource, EnrichmentFanout, ParserOptions};
use integration_gateway::store::{postgres, PgLookups, PgStore};
use integration_gateway::transport::HttpTransport;
use integration_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "integration-gateway", version, about)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Overrides `pipeline.database.url`.
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway HTTP listener.
    Serve,
    /// Process batch files from the inbox.
    Ingest {
        /// Drain the inbox once and exit instead of watching it.
        #[arg(long)]
        once: bool,
    },
    /// Validate the configuration and print the route table.
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => finalize_config(AppConfig::default())?,
    };
    if let Some(url) = cli.database_url {
        config.pipeline.database.url = Some(url);
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "integration-gateway starting");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await?,
        Command::Ingest { once } => ingest(config, once).await?,
        Command::Check => check(&config),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_metrics(config: &AppConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn Error>> {
    init_metrics(&config);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        routes = config.routes.len(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::from_config(&config, Arc::new(HttpTransport::new()))?;
    server.run(listener, shutdown.signalled()).await?;
    Ok(())
}

async fn ingest(config: AppConfig, once: bool) -> Result<(), Box<dyn Error>> {
    init_metrics(&config);

    let pipeline_config = &config.pipeline;
    let url = pipeline_config
        .database
        .url
        .as_deref()
        .ok_or("ingest needs a database URL (pipeline.database.url or --database-url)")?;
    let pool = postgres::connect(url, &pipeline_config.database).await?;

    let pipeline = BatchPipeline::new(
        EnrichmentFanout::new(Arc::new(PgLookups::new(pool.clone(), &pipeline_config.statements))),
        Arc::new(PgStore::new(pool.clone(), &pipeline_config.statements)),
        ParserOptions::from(pipeline_config),
    );
    let source = DirectorySource::new(pipeline_config, pipeline);

    let outcome = if once {
        source.prepare().await?;
        let summary = source.run_once().await?;
        tracing::info!(
            committed = summary.committed.len(),
            failed = summary.failed,
            "Inbox drained"
        );
        // Any failed batch makes the process exit non-zero.
        summary.into_result(source.error_dir()).map(|_| ())
    } else {
        let shutdown = Shutdown::new();
        tokio::spawn(shutdown_on_signal(shutdown.clone()));
        source.run(shutdown).await
    };

    pool.close().await;
    outcome?;
    Ok(())
}

fn check(config: &AppConfig) {
    println!("configuration ok: {} route(s)", config.routes.len());
    for route in &config.routes {
        println!(
            "  {:<14} {:<6} {:<28} -> {}",
            route.name, route.method, route.path, route.target
        );
    }
}
