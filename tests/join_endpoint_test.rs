//! HTTP surface: user creation, the join endpoint, fund and eligibility
//! reads, and error mapping.

use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use tierflow::api;
use tierflow::config::Config;
use tierflow::db::init_db;
use tierflow::domain::UserId;
use tierflow::Repository;

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
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        mother_id: UserId::new("mother".to_string()),
        write_retry_limit: 3,
    };

    let app = api::create_router(api::AppState::new(repo, config));

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;
    let (status, body) = get(test_app.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(test_app.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_create_user_generates_id_when_absent() {
    let test_app = setup_test_app().await;

    let (status, body) = post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"wallet": "0xabc"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].as_str().unwrap().len() > 0);
    assert_eq!(body["binaryJoined"], false);

    let id = body["id"].as_str().unwrap().to_string();
    let (status, body) = get(test_app.app, &format!("/v1/users/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
}

#[tokio::test]
async fn test_create_user_rejects_unknown_sponsor_and_duplicates() {
    let test_app = setup_test_app().await;

    let (status, body) = post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "u1", "wallet": "0x1", "sponsorId": "ghost"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "u1", "wallet": "0x1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        test_app.app,
        "/v1/users",
        serde_json::json!({"id": "u1", "wallet": "0x1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_join_endpoint_full_flow() {
    let test_app = setup_test_app().await;

    post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "root", "wallet": "0xr"}),
    )
    .await;
    post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "a", "wallet": "0xa", "sponsorId": "root"}),
    )
    .await;

    let (status, body) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x1",
            "userId": "root",
            "program": "binary",
            "slotNo": 1,
            "amount": "0.0022"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replayed"], false);
    assert_eq!(body["totalMissed"], "0.0022");
    assert_eq!(body["commissions"].as_array().unwrap().len(), 17);

    let (status, body) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x2",
            "userId": "a",
            "program": "binary",
            "slotNo": 1,
            "amount": "0.0022"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPaid"], "0.001045");

    // Replay by tx hash.
    let (status, body) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x2",
            "userId": "a",
            "program": "binary",
            "slotNo": 1,
            "amount": "0.0022"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replayed"], true);

    let (status, body) = get(test_app.app, "/v1/funds?program=binary").await;
    assert_eq!(status, StatusCode::OK);
    let funds = body["funds"].as_array().unwrap();
    let missed = funds
        .iter()
        .find(|f| f["kind"] == "missed_profit")
        .unwrap();
    assert_eq!(missed["program"], "binary");
    // root's full fan-out plus a's unreachable levels.
    assert_eq!(missed["available"], "0.003355");
}

#[tokio::test]
async fn test_join_endpoint_error_mapping() {
    let test_app = setup_test_app().await;
    post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "u", "wallet": "0xu"}),
    )
    .await;

    // Wrong price -> 400.
    let (status, _) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x1",
            "userId": "u",
            "program": "binary",
            "slotNo": 1,
            "amount": "9.9"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Out-of-order program -> 400.
    let (status, _) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x2",
            "userId": "u",
            "program": "matrix",
            "slotNo": 1,
            "amount": "0.0025"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown payer -> 404.
    let (status, _) = post(
        test_app.app.clone(),
        "/v1/join",
        serde_json::json!({
            "txHash": "0x3",
            "userId": "ghost",
            "program": "binary",
            "slotNo": 1,
            "amount": "0.0022"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown program string -> 400 before the engine runs.
    let (status, _) = post(
        test_app.app,
        "/v1/join",
        serde_json::json!({
            "txHash": "0x4",
            "userId": "u",
            "program": "jackpot",
            "slotNo": 1,
            "amount": "0.0022"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_eligibility_endpoint() {
    let test_app = setup_test_app().await;
    post(
        test_app.app.clone(),
        "/v1/users",
        serde_json::json!({"id": "u", "wallet": "0xu"}),
    )
    .await;

    let (status, body) = get(test_app.app.clone(), "/v1/eligibility?user=u").await;
    assert_eq!(status, StatusCode::OK);
    let reports = body["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 6);
    for r in reports {
        assert_eq!(r["isEligible"], false);
        assert!(r["pendingAmount"].is_string());
    }

    let (status, body) = get(
        test_app.app.clone(),
        "/v1/eligibility?user=u&kind=leadership_stipend",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"].as_array().unwrap().len(), 1);

    let (status, _) = get(test_app.app, "/v1/eligibility?user=ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_daily_batch_endpoint_replays() {
    let test_app = setup_test_app().await;

    let (status, body) = post(test_app.app.clone(), "/v1/batch/daily", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replayed"], false);

    let (status, body) = post(test_app.app, "/v1/batch/daily", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replayed"], true);
}
