//! Read-only admin endpoints.
//!
//! Mounted on the gateway listener next to the catch-all route; axum
//! prefers these static paths over the wildcard.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
}
