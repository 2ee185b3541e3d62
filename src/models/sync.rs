use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::Domain;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerSyncRequest {
    pub priority: Option<i32>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FastPathRequest {
    pub domain: Domain,
}

#[derive(Debug, Clone, Serialize)]
pub struct FastPathResponse {
    pub active: bool,
    pub refcount: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedRequestView {
    pub domain: Domain,
    pub priority: i32,
    pub requested_at: DateTime<Utc>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentRunView {
    pub domain: Domain,
    pub started_at: DateTime<Utc>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FastPathView {
    pub domain: Domain,
    pub refcount: u32,
    pub remaining_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointView {
    pub domain: Domain,
    pub state: String,
    pub last_page: u32,
    pub total_pages: Option<u32>,
    pub items_synced: u64,
    pub last_success_at: Option<NaiveDateTime>,
    pub last_failure_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub current: Option<CurrentRunView>,
    pub queue: Vec<QueuedRequestView>,
    pub fast_path: Option<FastPathView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusResponse {
    #[serde(flatten)]
    pub orchestrator: OrchestratorStatus,
    pub checkpoints: Vec<CheckpointView>,
}
