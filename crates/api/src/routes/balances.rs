//! Period balance routes: reads, overviews, and maintenance.
//!
//! Periods without a row are answered from the nearest earlier row, so a
//! read or overview never 404s. Rebuild and cascade are the repair entry
//! points for rows a failed mutation left stale.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use moneyflow_core::ledger::InvariantBreach;
use moneyflow_core::period::{Granularity, PeriodKey};
use moneyflow_shared::{AppResult, UserId};
use serde::Serialize;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{
    error_response, ledger_error_response, parse_granularity, parse_period, parse_user,
};

/// Creates the balance routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{user_id}/balances/{granularity}/{period_key}",
            get(get_balance),
        )
        .route(
            "/users/{user_id}/balances/{granularity}/{period_key}/cascade",
            post(cascade_balance),
        )
        .route(
            "/users/{user_id}/balances/{granularity}/rebuild",
            post(rebuild_balances),
        )
        .route(
            "/users/{user_id}/overview/{granularity}/{period_key}",
            get(get_overview),
        )
        .route("/users/{user_id}/audit/{granularity}", get(audit_balances))
}

/// Response for an audit of one chain.
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    /// Granularity audited.
    pub granularity: Granularity,
    /// Whether every row passed.
    pub consistent: bool,
    /// Every breach found, in period order.
    pub breaches: Vec<InvariantBreach>,
}

fn period_path(
    user_id: &str,
    granularity: &str,
    period_key: &str,
) -> AppResult<(UserId, PeriodKey)> {
    Ok((parse_user(user_id)?, parse_period(granularity, period_key)?))
}

fn chain_path(user_id: &str, granularity: &str) -> AppResult<(UserId, Granularity)> {
    Ok((parse_user(user_id)?, parse_granularity(granularity)?))
}

/// GET /users/{user_id}/balances/{granularity}/{period_key}
async fn get_balance(
    State(state): State<AppState>,
    Path((user_id, granularity, period_key)): Path<(String, String, String)>,
) -> Response {
    let (user_id, key) = match period_path(&user_id, &granularity, &period_key) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err),
    };

    match state.ledger.read(user_id, key).await {
        Ok(read) => (StatusCode::OK, Json(read)).into_response(),
        Err(err) => ledger_error_response(err),
    }
}

/// GET /users/{user_id}/overview/{granularity}/{period_key}
async fn get_overview(
    State(state): State<AppState>,
    Path((user_id, granularity, period_key)): Path<(String, String, String)>,
) -> Response {
    let (user_id, key) = match period_path(&user_id, &granularity, &period_key) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err),
    };

    match state.ledger.overview(user_id, key).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => ledger_error_response(err),
    }
}

/// POST /users/{user_id}/balances/{granularity}/{period_key}/cascade
async fn cascade_balance(
    State(state): State<AppState>,
    Path((user_id, granularity, period_key)): Path<(String, String, String)>,
) -> Response {
    let (user_id, key) = match period_path(&user_id, &granularity, &period_key) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err),
    };

    match state.ledger.cascade(user_id, key).await {
        Ok(report) => {
            info!(%user_id, period_key = %key, "Cascade re-run");
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => ledger_error_response(err),
    }
}

/// POST /users/{user_id}/balances/{granularity}/rebuild
async fn rebuild_balances(
    State(state): State<AppState>,
    Path((user_id, granularity)): Path<(String, String)>,
) -> Response {
    let (user_id, granularity) = match chain_path(&user_id, &granularity) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err),
    };

    match state.ledger.rebuild(user_id, granularity).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => ledger_error_response(err),
    }
}

/// GET /users/{user_id}/audit/{granularity}
async fn audit_balances(
    State(state): State<AppState>,
    Path((user_id, granularity)): Path<(String, String)>,
) -> Response {
    let (user_id, granularity) = match chain_path(&user_id, &granularity) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(&err),
    };

    match state.ledger.audit(user_id, granularity).await {
        Ok(breaches) => {
            if !breaches.is_empty() {
                warn!(%user_id, %granularity, count = breaches.len(), "Audit found breaches");
            }
            let response = AuditResponse {
                granularity,
                consistent: breaches.is_empty(),
                breaches,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => ledger_error_response(err),
    }
}
