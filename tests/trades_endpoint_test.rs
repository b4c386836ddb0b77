use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use wheelbook::api;
use wheelbook::config::Config;
use wheelbook::db::init_db;
use wheelbook::engine::lots::OversellMode;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(wheelbook::Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        oversell_mode: OversellMode::Short,
        reinvest_grace_hours: 48,
    };

    let state = api::AppState::new(repo, config);
    let app = api::create_router(state);

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_account(app: &axum::Router, name: &str) -> i64 {
    let (status, body) = post(app, "/v1/accounts", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_account_rejects_duplicate_name() {
    let t = setup_test_app().await;
    create_account(&t.app, "main").await;
    let (status, _) = post(&t.app, "/v1/accounts", json!({ "name": "main" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_onboarding_gate_blocks_cash_mirroring() {
    let t = setup_test_app().await;
    let id = create_account(&t.app, "main").await;

    // Historical trade before onboarding finishes: no cash movement.
    let (status, _) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/stock"),
        json!({
            "symbol": "MSFT",
            "action": "BUY",
            "quantity": "10",
            "price": "50",
            "fees": "1",
            "occurredAt": "2024-01-02T15:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, statement) = get(&t.app, &format!("/v1/accounts/{id}/statement")).await;
    assert_eq!(statement["freeCash"].as_f64().unwrap(), 0.0);
    assert_eq!(statement["entries"].as_array().unwrap().len(), 1);

    // Deposits always move cash, gate or not.
    let (status, _) = post(
        &t.app,
        &format!("/v1/accounts/{id}/deposits"),
        json!({ "amount": "10000", "occurredAt": "2024-01-03T09:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, account) =
        post(&t.app, &format!("/v1/accounts/{id}/onboarding-complete"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["onboardingComplete"], json!(true));

    // Post-onboarding trades mirror into free cash.
    let (status, _) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/stock"),
        json!({
            "symbol": "MSFT",
            "action": "BUY",
            "quantity": "10",
            "price": "50",
            "fees": "1",
            "occurredAt": "2024-01-04T15:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, statement) = get(&t.app, &format!("/v1/accounts/{id}/statement")).await;
    assert_eq!(statement["freeCash"].as_f64().unwrap(), 9499.0);
}

#[tokio::test]
async fn test_fifo_sell_realizes_gain_across_lots() {
    let t = setup_test_app().await;
    let id = create_account(&t.app, "main").await;

    for (qty, price, at) in [
        ("100", "10", "2024-01-02T15:00:00Z"),
        ("50", "12", "2024-01-03T15:00:00Z"),
    ] {
        let (status, _) = post(
            &t.app,
            &format!("/v1/accounts/{id}/trades/stock"),
            json!({
                "symbol": "AAPL",
                "action": "BUY",
                "quantity": qty,
                "price": price,
                "occurredAt": at
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/stock"),
        json!({
            "symbol": "AAPL",
            "action": "SELL",
            "quantity": "120",
            "price": "15",
            "occurredAt": "2024-01-04T15:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // 100 shares at basis 10 plus 20 at basis 12, sold at 15.
    assert_eq!(body["realizedGain"].as_f64().unwrap(), 560.0);

    let (_, portfolio) = get(&t.app, &format!("/v1/accounts/{id}/portfolio")).await;
    let positions = portfolio["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["shares"].as_f64().unwrap(), 30.0);
    assert_eq!(positions[0]["adjustedBasis"].as_f64().unwrap(), 360.0);
}

#[tokio::test]
async fn test_option_open_creates_instance_and_premium_entry() {
    let t = setup_test_app().await;
    let id = create_account(&t.app, "main").await;

    let (status, body) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/option"),
        json!({
            "symbol": "NVDA",
            "action": "STO",
            "callPut": "PUT",
            "strike": "100",
            "expiration": "2026-10-16",
            "quantity": "1",
            "price": "2.50",
            "occurredAt": "2024-02-01T15:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["finalized"], json!(false));
    let instance_id = body["instanceId"].as_i64().unwrap();

    let (_, instances) = get(&t.app, &format!("/v1/accounts/{id}/instances?status=open")).await;
    let open = instances.as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["id"].as_i64().unwrap(), instance_id);
    assert_eq!(open[0]["status"], json!("OPEN"));

    // One contract at 2.50 is a 250 premium credit.
    let (_, statement) = get(&t.app, &format!("/v1/accounts/{id}/statement")).await;
    let entries = statement["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], json!("PREMIUM_CREDIT"));
    assert_eq!(entries[0]["amount"].as_f64().unwrap(), 250.0);
}

#[tokio::test]
async fn test_closing_trade_without_open_instance_is_404() {
    let t = setup_test_app().await;
    let id = create_account(&t.app, "main").await;

    let (status, _) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/option"),
        json!({
            "symbol": "NVDA",
            "action": "BTC",
            "callPut": "PUT",
            "strike": "100",
            "expiration": "2026-10-16",
            "quantity": "1",
            "price": "0.50"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_decimal_is_rejected() {
    let t = setup_test_app().await;
    let id = create_account(&t.app, "main").await;

    let (status, body) = post(
        &t.app,
        &format!("/v1/accounts/{id}/trades/stock"),
        json!({
            "symbol": "MSFT",
            "action": "BUY",
            "quantity": "ten",
            "price": "50"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("quantity"));
}
