//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes over the ledger service
//! - JSON error responses
//!
//! There is no authentication layer; user ids arrive in the request.

pub mod error;
pub mod routes;

use axum::Router;
use moneyflow_core::ledger::LedgerService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ledger service over the configured store.
    pub ledger: Arc<LedgerService>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
