//! Route tests against an in-memory ledger.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use moneyflow_api::{AppState, create_router};
use moneyflow_core::ledger::{
    FaultPoint, InMemoryBalanceStore, LedgerPolicy, LedgerService, PeriodBalance, RetryPolicy,
};
use moneyflow_core::period::{Granularity, PeriodKey};
use moneyflow_shared::UserId;

fn app() -> (Router, Arc<InMemoryBalanceStore>) {
    let store = Arc::new(InMemoryBalanceStore::new());
    let mut policy = LedgerPolicy::default();
    policy.retry = RetryPolicy::none();
    let ledger = LedgerService::new(store.clone(), policy);
    let state = AppState {
        ledger: Arc::new(ledger),
    };
    (create_router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn mutation(user: UserId, date: &str, amount: &str, method: &str, kind: &str) -> Value {
    json!({
        "user_id": user,
        "date": date,
        "amount": amount,
        "payment_method": method,
        "kind": kind
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["granularities"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_mutation_updates_every_granularity() {
    let (app, store) = app();
    let user = UserId::new();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "1000", "cash", "income")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcomes"].as_array().unwrap().len(), 6);
    assert_eq!(store.len().await, 6);

    for (granularity, key) in [
        ("daily", "2024-03-15"),
        ("weekly", "2024-11"),
        ("monthly", "2024-03"),
        ("quarterly", "2024-Q1"),
        ("semiannual", "2024-H1"),
        ("annual", "2024"),
    ] {
        let uri = format!("/api/v1/users/{user}/balances/{granularity}/{key}");
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK, "{granularity}");
        assert_eq!(body["source"], "present");
        assert_eq!(amount(&body["row"]["income_cash_amount"]), dec!(1000));
    }
}

#[tokio::test]
async fn test_reads_inherit_from_earlier_periods() {
    let (app, _) = app();
    let user = UserId::new();
    send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "1000", "cash", "income")),
    )
    .await;

    let uri = format!("/api/v1/users/{user}/balances/monthly/2024-06");
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "inherited");
    assert_eq!(body["from"], "2024-03");
    assert_eq!(amount(&body["row"]["total_balance"]), dec!(1000));
    assert_eq!(amount(&body["row"]["income_cash_amount"]), dec!(0));

    let uri = format!("/api/v1/users/{}/balances/monthly/2024-06", UserId::new());
    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(body["source"], "empty");
}

#[tokio::test]
async fn test_overview() {
    let (app, _) = app();
    let user = UserId::new();
    send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "1000", "bank", "income")),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-20", "200", "cash", "expense")),
    )
    .await;

    let uri = format!("/api/v1/users/{user}/overview/monthly/2024-03");
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["total_income"]), dec!(1000));
    assert_eq!(amount(&body["spent_amount"]), dec!(200));
    assert_eq!(amount(&body["total_balance"]), dec!(800));
    assert_eq!(body["high_spending"], false);
}

#[tokio::test]
async fn test_edit_moves_amount_between_periods() {
    let (app, _) = app();
    let user = UserId::new();
    let old = mutation(user, "2024-03-15", "100", "cash", "expense");
    send(&app, "POST", "/api/v1/ledger/mutations", Some(old.clone())).await;

    let new = mutation(user, "2024-05-02", "150", "cash", "expense");
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/ledger/edits",
        Some(json!({ "old": old, "new": new })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reversed"]["outcomes"].is_array());

    let uri = format!("/api/v1/users/{user}/balances/monthly/2024-03");
    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(amount(&body["row"]["expense_cash_amount"]), dec!(0));

    let uri = format!("/api/v1/users/{user}/balances/monthly/2024-05");
    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(amount(&body["row"]["total_balance"]), dec!(-150));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let (app, store) = app();
    let user = UserId::new();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "0", "cash", "income")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(json!({ "user_id": user, "date": "2024-03-15" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let edit = json!({
        "old": mutation(user, "2024-03-15", "10", "cash", "income"),
        "new": mutation(UserId::new(), "2024-03-15", "10", "cash", "income"),
    });
    let (status, _) = send(&app, "POST", "/api/v1/ledger/edits", Some(edit)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for uri in [
        format!("/api/v1/users/{user}/balances/monthly/2024-3"),
        format!("/api/v1/users/{user}/balances/fortnightly/2024-03"),
        "/api/v1/users/not-a-uuid/balances/monthly/2024-03".to_string(),
    ] {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_partial_failure_reports_granularities_to_replay() {
    let (app, store) = app();
    let user = UserId::new();
    store.fail_next(FaultPoint::ApplyDelta, 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "50", "bank", "income")),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "LEDGER_UPDATE_INCOMPLETE");
    assert_eq!(body["applied"].as_array().unwrap().len(), 5);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["retryable"], true);
    assert_eq!(failed[0]["stage"], "upsert");

    let replay = json!({
        "mutation": mutation(user, "2024-03-15", "50", "bank", "income"),
        "granularity": failed[0]["granularity"],
        "stage": failed[0]["stage"],
    });
    let (status, body) = send(&app, "POST", "/api/v1/ledger/replays", Some(replay)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["row"]["income_bank_amount"]), dec!(50));
    assert_eq!(store.len().await, 6);
}

#[tokio::test]
async fn test_cascade_failure_replay_keeps_single_application() {
    let (app, store) = app();
    let user = UserId::new();
    send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-06-01", "1", "cash", "income")),
    )
    .await;
    store.fail_next(FaultPoint::Save, 1);

    let january = mutation(user, "2024-01-01", "100", "cash", "income");
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(january.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["stage"], "cascade");

    let granularity = failed[0]["granularity"].as_str().unwrap().to_string();
    let key = failed[0]["period_key"].as_str().unwrap().to_string();
    let replay = json!({
        "mutation": january,
        "granularity": granularity,
        "stage": "cascade",
    });
    let (status, _) = send(&app, "POST", "/api/v1/ledger/replays", Some(replay)).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/users/{user}/balances/{granularity}/{key}");
    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(amount(&body["row"]["income_cash_amount"]), dec!(100));

    let uri = format!("/api/v1/users/{user}/audit/{granularity}");
    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(body["consistent"], true);
}

#[tokio::test]
async fn test_out_of_range_amounts_are_rejected() {
    let (app, store) = app();
    let user = UserId::new();

    for amount in ["1000000000000000", "12.34567"] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/ledger/mutations",
            Some(mutation(user, "2024-03-15", amount, "cash", "income")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{amount}");
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn test_audit_and_rebuild_repair_a_chain() {
    let (app, store) = app();
    let user = UserId::new();
    send(
        &app,
        "POST",
        "/api/v1/ledger/mutations",
        Some(mutation(user, "2024-03-15", "40", "cash", "income")),
    )
    .await;
    let mut corrupt = PeriodBalance::empty(
        user,
        PeriodKey::parse(Granularity::Monthly, "2024-04").unwrap(),
    );
    corrupt.total_balance = dec!(13);
    store.insert_raw(corrupt).await;

    let uri = format!("/api/v1/users/{user}/audit/monthly");
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], false);

    let rebuild = format!("/api/v1/users/{user}/balances/monthly/rebuild");
    let (status, body) = send(&app, "POST", &rebuild, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], 2);
    assert_eq!(body["updated"], 1);

    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(body["consistent"], true);

    let cascade = format!("/api/v1/users/{user}/balances/monthly/2024-03/cascade");
    let (status, _) = send(&app, "POST", &cascade, None).await;
    assert_eq!(status, StatusCode::OK);
}
