//! HTTP-level tests for the webhook and health routes.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use jellyfin_notify::api::{ApiServer, ApiServerConfig, AppState};
use jellyfin_notify::database::{self, DbPool, repositories::SqlxContentLedger};
use jellyfin_notify::domain::NotificationPayload;
use jellyfin_notify::ingest::{BroadcastDispatcher, IngestionGate};

const SECRET: &str = "hunter2";

const MOVIE_ADDED: &str = r#"{"NotificationType":"ItemAdded","ItemType":"Movie","ItemId":"42","ItemName":"Interstellar","Year":2014}"#;

#[derive(Default)]
struct CountingDispatcher {
    dispatched: Mutex<Vec<NotificationPayload>>,
}

impl BroadcastDispatcher for CountingDispatcher {
    fn dispatch(&self, payload: NotificationPayload) -> jellyfin_notify::Result<()> {
        self.dispatched.lock().unwrap().push(payload);
        Ok(())
    }
}

async fn setup(secret: &str) -> (Router, Arc<CountingDispatcher>, DbPool) {
    let pool = database::init_pool_with_size("sqlite::memory:", 1)
        .await
        .unwrap();
    database::run_migrations(&pool).await.unwrap();

    let dispatcher = Arc::new(CountingDispatcher::default());
    let gate = IngestionGate::new(Arc::new(SqlxContentLedger::new(pool.clone())), dispatcher.clone());
    let state = AppState::new(gate, pool.clone(), secret);
    let server = ApiServer::new(ApiServerConfig::default(), state, CancellationToken::new());

    (server.build_router(), dispatcher, pool)
}

fn webhook(body: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("X-Webhook-Secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_secret_mismatch_is_unauthorized() {
    let (router, dispatcher, _pool) = setup(SECRET).await;

    let response = router
        .clone()
        .oneshot(webhook(MOVIE_ADDED, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Rejected before parsing, even for garbage bodies.
    let response = router
        .oneshot(webhook("not json", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(dispatcher.dispatched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_accepted_then_duplicate() {
    let (router, dispatcher, _pool) = setup(SECRET).await;

    let response = router
        .clone()
        .oneshot(webhook(MOVIE_ADDED, Some(SECRET)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["outcome"], "accepted");

    let response = router
        .oneshot(webhook(MOVIE_ADDED, Some(SECRET)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["outcome"], "duplicate");

    assert_eq!(dispatcher.dispatched.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsupported_event_is_acknowledged() {
    let (router, dispatcher, _pool) = setup("").await;

    let body = r#"{"NotificationType":"PlaybackStart","ItemType":"Movie","ItemId":"42"}"#;
    let response = router.oneshot(webhook(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["outcome"], "ignored");
    assert!(dispatcher.dispatched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unparseable_body_is_bad_request() {
    let (router, _dispatcher, _pool) = setup("").await;

    let response = router.oneshot(webhook("{not json", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let (router, dispatcher, pool) = setup("").await;
    pool.close().await;

    let response = router.oneshot(webhook(MOVIE_ADDED, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(dispatcher.dispatched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_endpoints() {
    let (router, _dispatcher, pool) = setup("").await;

    let response = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());

    let response = router
        .clone()
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    pool.close().await;
    let response = router
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
