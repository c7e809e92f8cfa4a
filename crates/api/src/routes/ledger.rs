//! Ledger mutation routes.
//!
//! The income, expense, and bill services post every create, delete, and
//! edit here. A mutation is applied to all six granularities; a partial
//! failure answers 503 with the granularities to replay, and each one is
//! finished by posting it back to `/ledger/replays`.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use moneyflow_core::ledger::{TransactionMutation, UpdateStage};
use moneyflow_core::period::Granularity;
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::error::{ledger_error_response, rejection_response};

/// Creates the ledger mutation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ledger/mutations", post(record_mutation))
        .route("/ledger/edits", post(record_edit))
        .route("/ledger/replays", post(replay_granularity))
}

/// Request body for an edit: the stored values and the replacement.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    /// Values currently applied to the ledger.
    pub old: TransactionMutation,
    /// Values replacing them.
    pub new: TransactionMutation,
}

/// Request body for a replay: the mutation and one failed entry from its
/// incomplete response.
#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    /// Mutation that was only partly applied.
    pub mutation: TransactionMutation,
    /// Granularity reported as failed.
    pub granularity: Granularity,
    /// Stage reported with the failure.
    pub stage: UpdateStage,
}

/// POST /ledger/mutations - Apply or reverse one transaction.
async fn record_mutation(
    State(state): State<AppState>,
    body: Result<Json<TransactionMutation>, JsonRejection>,
) -> Response {
    let Json(mutation) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };

    match state.ledger.record(&mutation).await {
        Ok(report) => {
            info!(
                user_id = %mutation.user_id,
                date = %mutation.date,
                operation = ?mutation.operation,
                "Mutation recorded"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => ledger_error_response(err),
    }
}

/// POST /ledger/edits - Reverse the old values, then apply the new ones.
async fn record_edit(
    State(state): State<AppState>,
    body: Result<Json<EditRequest>, JsonRejection>,
) -> Response {
    let Json(edit) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };

    match state.ledger.record_edit(&edit.old, &edit.new).await {
        Ok(report) => {
            info!(
                user_id = %edit.new.user_id,
                old_date = %edit.old.date,
                new_date = %edit.new.date,
                "Edit recorded"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => ledger_error_response(err),
    }
}

/// POST /ledger/replays - Finish one granularity of a partly applied mutation.
async fn replay_granularity(
    State(state): State<AppState>,
    body: Result<Json<ReplayRequest>, JsonRejection>,
) -> Response {
    let Json(replay) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };

    match state
        .ledger
        .replay(&replay.mutation, replay.granularity, replay.stage)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => ledger_error_response(err),
    }
}
