use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archibald_bridge::browser::backend::{BrowserBackend, CdpBackend};
use archibald_bridge::browser::pool::SessionPool;
use archibald_bridge::config::BridgeConfig;
use archibald_bridge::domains::build_domains;
use archibald_bridge::services::delta_sync::DeltaSyncEngine;
use archibald_bridge::services::erp_driver::{ErpDriver, HttpBotDriver};
use archibald_bridge::services::order_queue::OrderJobQueue;
use archibald_bridge::services::orchestrator::SyncOrchestrator;
use archibald_bridge::services::pdf_extract::PdfExtractor;
use archibald_bridge::services::priority_lock::PriorityLock;
use archibald_bridge::services::progress::ProgressBroadcaster;
use archibald_bridge::services::storage::{
    ChangeLog, CheckpointStore, DbChangeLog, DbCheckpointStore, DbOrderJobStore, OrderJobStore,
};
use archibald_bridge::{AppState, handlers, jobs};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,archibald_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = BridgeConfig::from_env();

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Browser fleet
    let backend: Arc<dyn BrowserBackend> = Arc::new(CdpBackend::new(config.pool.clone()));
    let pool = SessionPool::new(backend, config.pool.clone());
    pool.initialize()
        .await
        .expect("Failed to start browser pool");

    // Collaborators
    let driver: Arc<dyn ErpDriver> = Arc::new(HttpBotDriver::new(config.bot_base_url.clone()));
    let extractor = PdfExtractor::new(config.parser_script_dir.clone());
    let progress = ProgressBroadcaster::new();

    // Arbitration core
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(DbCheckpointStore::new(db.clone()));
    let changes: Arc<dyn ChangeLog> = Arc::new(DbChangeLog::new(db.clone()));
    let priority_lock = PriorityLock::new();
    let engine = DeltaSyncEngine::new(
        Arc::clone(&checkpoints),
        changes,
        progress.clone(),
        Arc::clone(&priority_lock),
        config.sync.freshness_window,
    );
    let domains = build_domains(&db, &driver, &extractor);
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&pool),
        engine,
        Arc::clone(&driver),
        domains,
        priority_lock,
        config.sync.clone(),
    );
    orchestrator.start();

    let job_store: Arc<dyn OrderJobStore> = Arc::new(DbOrderJobStore::new(db.clone()));
    let order_queue = OrderJobQueue::new(
        job_store,
        Arc::clone(&orchestrator),
        Arc::clone(&pool),
        driver,
        progress.clone(),
        config.orders.clone(),
    );
    order_queue.start();

    jobs::scheduled_sync::start_scheduled_sync_jobs(Arc::clone(&orchestrator), &config.sync);

    let state = AppState {
        db,
        pool: Arc::clone(&pool),
        orchestrator: Arc::clone(&orchestrator),
        order_queue,
        checkpoints,
        progress,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/sync/status", get(handlers::sync::sync_status))
        .route(
            "/api/sync/fast-path",
            post(handlers::sync::enter_fast_path).delete(handlers::sync::exit_fast_path),
        )
        .route("/api/sync/ws", get(handlers::progress_ws::progress_ws))
        .route("/api/sync/{domain}", post(handlers::sync::trigger_sync))
        .route(
            "/api/sync/{domain}/reset",
            post(handlers::sync::reset_checkpoint),
        )
        .route("/api/orders", post(handlers::orders::enqueue_order))
        .route("/api/orders/{job_id}", get(handlers::orders::get_order))
        .route(
            "/api/orders/{job_id}/retry",
            post(handlers::orders::retry_order),
        )
        .route("/api/pool/stats", get(handlers::pool::pool_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    orchestrator.shutdown();
    pool.shutdown().await;
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
}
