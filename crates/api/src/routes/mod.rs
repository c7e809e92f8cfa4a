//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod balances;
pub mod health;
pub mod ledger;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(ledger::routes())
        .merge(balances::routes())
}
