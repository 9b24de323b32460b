mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use common::{memory_store, ScriptedSource};
use pnlscan::api::router::create_router;
use pnlscan::config::AppConfig;
use pnlscan::db::{wallet_repo, MemoryStore};
use pnlscan::models::{ScanScope, WalletPnl};
use pnlscan::services::wallet_tracker::WalletTrackerManager;
use pnlscan::workerpool::WorkerPool;
use pnlscan::AppState;

fn build_test_app(api_token: Option<&str>) -> (Router, Arc<MemoryStore>) {
    let store = memory_store();
    let mut config = AppConfig::from_env().expect("config from env");
    config.api_token = api_token.map(str::to_string);
    config.tracker_poll_interval_secs = 1;

    let mut pool_config = config.tracker_pool();
    pool_config.scaling_interval = Duration::from_millis(50);
    let tracker = WalletTrackerManager::new(
        "sol",
        Arc::new(ScriptedSource::new()),
        WorkerPool::new(pool_config),
        config.tracker(),
    );

    let state = AppState {
        store: store.clone(),
        config,
        metrics_handle: pnlscan::metrics::detached_handle(),
        tracker: Arc::new(tracker),
    };
    (create_router(state), store)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _store) = build_test_app(None);

    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store) = build_test_app(None);

    let resp = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    // The detached recorder renders nothing recorded through the macros.
    let _text = String::from_utf8(body.to_vec()).unwrap();
}

#[tokio::test]
async fn test_tracker_add_list_delete() {
    let (app, _store) = build_test_app(None);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/wallettracker/add")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"walletaddress":"Wallet111"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["taskId"], "Wallet111");
    assert_eq!(json["priority"], 1);

    // Second add of the same wallet conflicts.
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/wallettracker/add")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"walletaddress":"Wallet111"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app.clone().oneshot(get("/api/wallettracker/list")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let tasks = json["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["taskId"], "Wallet111");

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/wallettracker/delete?taskId=Wallet111")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/wallettracker/delete?taskId=Wallet111")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.oneshot(get("/api/wallettracker/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["submitted"], 1);
}

#[tokio::test]
async fn test_tracker_add_requires_wallet() {
    let (app, _store) = build_test_app(None);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/wallettracker/add")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"walletaddress":"  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_wallet_detail() {
    let (app, store) = build_test_app(None);
    let pnl = WalletPnl::new("Wallet111", "sol", ScanScope::LastNDays(30));
    wallet_repo::save_wallet_pnl(store.as_ref(), &pnl).await.unwrap();

    let resp = app.clone().oneshot(get("/api/wallets/30d/Wallet111")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["wallet_address"], "Wallet111");

    let resp = app.clone().oneshot(get("/api/wallets/all_time/Wallet111")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.clone().oneshot(get("/api/wallets/week/Wallet111")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.oneshot(get("/api/wallets/30d/Wallet111?chain=tron")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_token_required_when_configured() {
    let (app, _store) = build_test_app(Some("secret"));

    let resp = app.clone().oneshot(get("/api/wallettracker/list")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/wallettracker/list")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/wallettracker/list")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Health stays public.
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
