//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin endpoints plus a catch-all gateway handler
//! - Wire up middleware (request ID, tracing, body limit, request timeout)
//! - Bind to a listener and serve until shutdown
//! - Dispatch requests to the gateway

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{AppConfig, ListenerConfig};
use crate::gateway::Gateway;
use crate::http::request::{into_inbound, request_id};
use crate::http::response::plain_text;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub max_body_bytes: usize,
}

/// Inbound HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    /// Create a server around an already built gateway.
    pub fn new(listener: &ListenerConfig, gateway: Gateway) -> Self {
        let gateway = Arc::new(gateway);
        let state = AppState {
            gateway: gateway.clone(),
            max_body_bytes: listener.max_body_bytes,
        };
        let router = Self::build_router(listener, state);
        Self { router, gateway }
    }

    /// Build the gateway from `config` and wrap it in a server.
    pub fn from_config(
        config: &AppConfig,
        transport: Arc<dyn crate::transport::Transport>,
    ) -> Result<Self, crate::routing::TemplateError> {
        let gateway = Gateway::from_config(config, transport)?;
        Ok(Self::new(&config.listener, gateway))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(listener: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .merge(admin::router())
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(listener.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The fully layered router, for serving on a custom accept loop.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.gateway.registry().len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every non-admin request goes through the gateway.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Gateway request"
    );

    let inbound = match into_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request("none", 413, "rejected", start);
            return plain_text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    match state.gateway.dispatch(inbound).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::info!(request_id = %request_id, error = %e, "Request rejected");
            metrics::record_request("none", e.status_code().as_u16(), "rejected", start);
            e.into_response()
        }
    }
}
