//! JSON error responses.
//!
//! Every failure leaves the API as `{"error": CODE, "message": text}` with the
//! status code of the matching [`AppError`]. An incomplete ledger update also
//! lists which granularities were applied and which must be replayed.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use moneyflow_core::ledger::LedgerError;
use moneyflow_core::period::{Granularity, PeriodKey};
use moneyflow_shared::{AppError, AppResult, UserId};
use serde_json::json;
use tracing::{error, warn};

/// Builds the response for an application error.
pub fn error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string()
        })),
    )
        .into_response()
}

/// Builds the response for a ledger error.
pub fn ledger_error_response(err: LedgerError) -> Response {
    if let LedgerError::Incomplete { applied, failed } = &err {
        error!(
            applied = applied.len(),
            failed = failed.len(),
            "Ledger update incomplete"
        );
        let applied: Vec<Granularity> = applied.iter().map(|o| o.granularity).collect();
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": err.error_code(),
                "message": err.to_string(),
                "applied": applied,
                "failed": failed
            })),
        )
            .into_response();
    }
    error_response(&AppError::from(err))
}

/// Builds the response for a malformed JSON body.
pub fn rejection_response(rejection: &JsonRejection) -> Response {
    error_response(&AppError::Validation(rejection.body_text()))
}

/// Parses a user id path segment.
///
/// # Errors
///
/// Returns `Validation` if the segment is not a UUID.
pub fn parse_user(text: &str) -> AppResult<UserId> {
    text.parse::<UserId>()
        .map_err(|err| AppError::Validation(format!("invalid user id {text:?}: {err}")))
}

/// Parses a granularity path segment.
///
/// # Errors
///
/// Returns `Validation` for an unknown granularity.
pub fn parse_granularity(text: &str) -> AppResult<Granularity> {
    text.parse::<Granularity>()
        .map_err(|err| AppError::from(LedgerError::from(err)))
}

/// Parses a granularity and period key path pair.
///
/// # Errors
///
/// Returns `Validation` for an unknown granularity or a non-canonical key.
pub fn parse_period(granularity: &str, period_key: &str) -> AppResult<PeriodKey> {
    let granularity = parse_granularity(granularity)?;
    PeriodKey::parse(granularity, period_key).map_err(|err| AppError::from(LedgerError::from(err)))
}
