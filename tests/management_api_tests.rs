//! Management surface tests: the handlers run against in-memory doubles, so
//! no database or browser is needed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use archibald_bridge::browser::backend::BrowserBackend;
use archibald_bridge::browser::pool::SessionPool;
use archibald_bridge::services::delta_sync::{DeltaSyncEngine, SyncDomain};
use archibald_bridge::services::erp_driver::ErpDriver;
use archibald_bridge::services::order_queue::OrderJobQueue;
use archibald_bridge::services::orchestrator::SyncOrchestrator;
use archibald_bridge::services::priority_lock::PriorityLock;
use archibald_bridge::services::progress::ProgressBroadcaster;
use archibald_bridge::services::storage::{ChangeLog, CheckpointStore, OrderJobStore};
use archibald_bridge::{AppState, handlers};

use crate::common::{
    MemChangeLog, MemCheckpointStore, MemOrderJobStore, MockBackend, MockDriver,
    test_order_config, test_pool_config, test_sync_config,
};

async fn test_state() -> AppState {
    let backend = MockBackend::new();
    let pool = SessionPool::new(backend as Arc<dyn BrowserBackend>, test_pool_config());
    pool.initialize().await.unwrap();

    let pages_active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let driver = MockDriver::new(pages_active);
    let checkpoints = MemCheckpointStore::new();
    let changes = MemChangeLog::new();
    let jobs = MemOrderJobStore::new();
    let progress = ProgressBroadcaster::new();
    let priority_lock = PriorityLock::new();

    let engine = DeltaSyncEngine::new(
        Arc::clone(&checkpoints) as Arc<dyn CheckpointStore>,
        changes as Arc<dyn ChangeLog>,
        progress.clone(),
        Arc::clone(&priority_lock),
        Duration::ZERO,
    );

    // Deliberately not started: requests queue up and stay observable
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&pool),
        engine,
        Arc::clone(&driver) as Arc<dyn ErpDriver>,
        std::collections::HashMap::<_, Arc<dyn SyncDomain>>::new(),
        priority_lock,
        test_sync_config(),
    );

    let order_queue = OrderJobQueue::new(
        jobs as Arc<dyn OrderJobStore>,
        Arc::clone(&orchestrator),
        Arc::clone(&pool),
        driver as Arc<dyn ErpDriver>,
        progress.clone(),
        test_order_config(),
    );

    AppState {
        db: sea_orm::DatabaseConnection::default(),
        pool,
        orchestrator,
        order_queue,
        checkpoints: checkpoints as Arc<dyn CheckpointStore>,
        progress,
    }
}

async fn test_router() -> Router {
    Router::new()
        .route("/api/sync/status", get(handlers::sync::sync_status))
        .route("/api/sync/{domain}", post(handlers::sync::trigger_sync))
        .route("/api/pool/stats", get(handlers::pool::pool_stats))
        .route("/api/orders", post(handlers::orders::enqueue_order))
        .route("/api/orders/{job_id}", get(handlers::orders::get_order))
        .with_state(test_state().await)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn trigger_rejects_unknown_domains() {
    let app = test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/payroll")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("payroll"));
}

#[tokio::test]
async fn triggered_domain_shows_up_in_status() {
    let app = test_router().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/customers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/sync/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let queue = json["queue"].as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["domain"], "customers");
    assert_eq!(queue[0]["priority"], 50);
    assert_eq!(json["checkpoints"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn pool_stats_reports_capacity_and_processes() {
    let app = test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/pool/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["capacity"], 6);
    assert_eq!(json["processes"].as_array().unwrap().len(), 3);
    assert!(
        json["processes"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["connected"] == true)
    );
}

#[tokio::test]
async fn enqueued_order_is_queryable_by_job_id() {
    let app = test_router().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/orders")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "user_id": "ada",
                        "order": {
                            "customer_account": "1002241",
                            "lines": [{ "article_id": "ART-1", "quantity": 2, "variant": null }],
                            "customer_reference": null
                        }
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/orders/{}", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "queued");
    assert_eq!(json["user_id"], "ada");
}

#[tokio::test]
async fn unknown_order_job_is_a_404() {
    let app = test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
