// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use browser::pool::SessionPool;
use services::order_queue::OrderJobQueue;
use services::orchestrator::SyncOrchestrator;
use services::progress::ProgressBroadcaster;
use services::storage::CheckpointStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub pool: Arc<SessionPool>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub order_queue: Arc<OrderJobQueue>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub progress: ProgressBroadcaster,
}

pub mod entities {
    pub mod prelude;
    pub mod change_records;
    pub mod customers;
    pub mod invoices;
    pub mod order_jobs;
    pub mod orders;
    pub mod prices;
    pub mod products;
    pub mod sync_checkpoints;
    pub mod transport_documents;
}

pub mod browser {
    pub mod backend;
    pub mod pool;
}

pub mod services {
    pub mod delta_sync;
    pub mod erp_driver;
    pub mod order_queue;
    pub mod orchestrator;
    pub mod pdf_extract;
    pub mod priority_lock;
    pub mod progress;
    pub mod storage;
}

pub mod config;
pub mod domains;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
