//! Storage contracts for the arbitration core
//!
//! The core only needs narrow upsert/lookup contracts; everything else about
//! the schema belongs to the entities and migrations. Each contract has a
//! SeaORM-backed production implementation here and in-memory doubles in the
//! tests.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::{change_records, order_jobs, sync_checkpoints};
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::models::order::OrderPayload;

// ---------------------------------------------------------------------------
// Checkpoints

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl CheckpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointState::Idle => "idle",
            CheckpointState::Running => "running",
            CheckpointState::Completed => "completed",
            CheckpointState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> CheckpointState {
        match s {
            "running" => CheckpointState::Running,
            "completed" => CheckpointState::Completed,
            "failed" => CheckpointState::Failed,
            _ => CheckpointState::Idle,
        }
    }
}

/// Durable progress marker for one domain's paginated sync.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub domain: Domain,
    /// Last fully committed page; a new run resumes at `last_page + 1`
    pub last_page: u32,
    pub total_pages: Option<u32>,
    pub items_synced: u64,
    pub state: CheckpointState,
    pub last_success_at: Option<NaiveDateTime>,
    pub last_failure_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

impl Checkpoint {
    pub fn fresh(domain: Domain) -> Self {
        Self {
            domain,
            last_page: 0,
            total_pages: None,
            items_synced: 0,
            state: CheckpointState::Idle,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
        }
    }
}

/// The resume point never regresses while a pass is incomplete. A smaller
/// incoming `last_page` is only honored when the previous pass completed
/// (a new pass legitimately starts over) — otherwise it is clamped up.
pub fn clamp_resume_point(existing: &Checkpoint, incoming: &mut Checkpoint) {
    if existing.state != CheckpointState::Completed && incoming.last_page < existing.last_page {
        incoming.last_page = existing.last_page;
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, domain: Domain) -> Result<Checkpoint, BridgeError>;
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), BridgeError>;
    /// Forced administrative reset: zeroes the resume point unconditionally.
    async fn reset(&self, domain: Domain) -> Result<(), BridgeError>;
}

pub struct DbCheckpointStore {
    db: DatabaseConnection,
}

impl DbCheckpointStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find(
        &self,
        domain: Domain,
    ) -> Result<Option<sync_checkpoints::Model>, BridgeError> {
        Ok(sync_checkpoints::Entity::find()
            .filter(sync_checkpoints::Column::Domain.eq(domain.as_str()))
            .one(&self.db)
            .await?)
    }
}

fn checkpoint_from_model(domain: Domain, model: &sync_checkpoints::Model) -> Checkpoint {
    Checkpoint {
        domain,
        last_page: model.last_page.max(0) as u32,
        total_pages: model.total_pages.map(|p| p.max(0) as u32),
        items_synced: model.items_synced.max(0) as u64,
        state: CheckpointState::parse(&model.state),
        last_success_at: model.last_success_at,
        last_failure_at: model.last_failure_at,
        last_error: model.last_error.clone(),
    }
}

#[async_trait]
impl CheckpointStore for DbCheckpointStore {
    async fn get(&self, domain: Domain) -> Result<Checkpoint, BridgeError> {
        match self.find(domain).await? {
            Some(model) => Ok(checkpoint_from_model(domain, &model)),
            None => Ok(Checkpoint::fresh(domain)),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();

        match self.find(checkpoint.domain).await? {
            Some(model) => {
                let mut incoming = checkpoint.clone();
                clamp_resume_point(&checkpoint_from_model(checkpoint.domain, &model), &mut incoming);

                let mut active: sync_checkpoints::ActiveModel = model.into();
                active.last_page = Set(incoming.last_page as i32);
                active.total_pages = Set(incoming.total_pages.map(|p| p as i32));
                active.items_synced = Set(incoming.items_synced as i64);
                active.state = Set(incoming.state.as_str().to_string());
                active.last_success_at = Set(incoming.last_success_at);
                active.last_failure_at = Set(incoming.last_failure_at);
                active.last_error = Set(incoming.last_error.clone());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = sync_checkpoints::ActiveModel {
                    id: NotSet,
                    domain: Set(checkpoint.domain.as_str().to_string()),
                    last_page: Set(checkpoint.last_page as i32),
                    total_pages: Set(checkpoint.total_pages.map(|p| p as i32)),
                    items_synced: Set(checkpoint.items_synced as i64),
                    state: Set(checkpoint.state.as_str().to_string()),
                    last_success_at: Set(checkpoint.last_success_at),
                    last_failure_at: Set(checkpoint.last_failure_at),
                    last_error: Set(checkpoint.last_error.clone()),
                    updated_at: Set(Some(now)),
                };
                active.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn reset(&self, domain: Domain) -> Result<(), BridgeError> {
        if let Some(model) = self.find(domain).await? {
            let mut active: sync_checkpoints::ActiveModel = model.into();
            active.last_page = Set(0);
            active.total_pages = Set(None);
            active.items_synced = Set(0);
            active.state = Set(CheckpointState::Idle.as_str().to_string());
            active.last_error = Set(None);
            active.updated_at = Set(Some(Utc::now().naive_utc()));
            active.update(&self.db).await?;
        }
        tracing::info!("[{}] Checkpoint forcibly reset", domain);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Change records

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Created,
    Updated,
    FieldChanged,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::FieldChanged => "field_changed",
        }
    }
}

/// One detected change, bound for the append-only audit trail.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub domain: Domain,
    pub entity_id: String,
    pub change_type: ChangeType,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub sync_run_id: Uuid,
}

#[async_trait]
pub trait ChangeLog: Send + Sync {
    async fn record(&self, entries: Vec<ChangeEntry>) -> Result<(), BridgeError>;
}

pub struct DbChangeLog {
    db: DatabaseConnection,
}

impl DbChangeLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChangeLog for DbChangeLog {
    async fn record(&self, entries: Vec<ChangeEntry>) -> Result<(), BridgeError> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now().naive_utc();
        let models: Vec<change_records::ActiveModel> = entries
            .into_iter()
            .map(|entry| change_records::ActiveModel {
                id: NotSet,
                domain: Set(entry.domain.as_str().to_string()),
                entity_id: Set(entry.entity_id),
                change_type: Set(entry.change_type.as_str().to_string()),
                field_name: Set(entry.field_name),
                old_value: Set(entry.old_value),
                new_value: Set(entry.new_value),
                sync_run_id: Set(entry.sync_run_id),
                recorded_at: Set(now),
            })
            .collect();

        change_records::Entity::insert_many(models).exec(&self.db).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Order jobs

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> JobStatus {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Queued,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderJob {
    pub job_id: Uuid,
    pub user_id: String,
    pub payload: OrderPayload,
    pub status: JobStatus,
    pub attempts: i32,
    pub erp_order_id: Option<String>,
    pub error: Option<String>,
    pub retry_of: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

impl OrderJob {
    pub fn new(user_id: String, payload: OrderPayload, retry_of: Option<Uuid>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user_id,
            payload,
            status: JobStatus::Queued,
            attempts: 0,
            erp_order_id: None,
            error: None,
            retry_of,
            created_at: Utc::now().naive_utc(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[async_trait]
pub trait OrderJobStore: Send + Sync {
    async fn insert(&self, job: &OrderJob) -> Result<(), BridgeError>;
    async fn update(&self, job: &OrderJob) -> Result<(), BridgeError>;
    async fn get(&self, job_id: Uuid) -> Result<Option<OrderJob>, BridgeError>;
}

pub struct DbOrderJobStore {
    db: DatabaseConnection,
}

impl DbOrderJobStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn job_from_model(model: order_jobs::Model) -> Result<OrderJob, BridgeError> {
    let payload: OrderPayload = serde_json::from_value(model.payload)
        .map_err(|e| BridgeError::OrderFailed(format!("corrupt job payload: {}", e)))?;
    Ok(OrderJob {
        job_id: model.job_id,
        user_id: model.user_id,
        payload,
        status: JobStatus::parse(&model.status),
        attempts: model.attempts,
        erp_order_id: model.erp_order_id,
        error: model.error,
        retry_of: model.retry_of,
        created_at: model.created_at,
        started_at: model.started_at,
        finished_at: model.finished_at,
    })
}

#[async_trait]
impl OrderJobStore for DbOrderJobStore {
    async fn insert(&self, job: &OrderJob) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(&job.payload)
            .map_err(|e| BridgeError::OrderFailed(format!("unserializable payload: {}", e)))?;

        let active = order_jobs::ActiveModel {
            job_id: Set(job.job_id),
            user_id: Set(job.user_id.clone()),
            payload: Set(payload),
            status: Set(job.status.as_str().to_string()),
            attempts: Set(job.attempts),
            erp_order_id: Set(job.erp_order_id.clone()),
            error: Set(job.error.clone()),
            retry_of: Set(job.retry_of),
            created_at: Set(job.created_at),
            started_at: Set(job.started_at),
            finished_at: Set(job.finished_at),
        };
        active.insert(&self.db).await?;
        Ok(())
    }

    async fn update(&self, job: &OrderJob) -> Result<(), BridgeError> {
        let Some(model) = order_jobs::Entity::find_by_id(job.job_id).one(&self.db).await? else {
            return Err(BridgeError::JobNotFound(job.job_id));
        };

        let mut active: order_jobs::ActiveModel = model.into();
        active.status = Set(job.status.as_str().to_string());
        active.attempts = Set(job.attempts);
        active.erp_order_id = Set(job.erp_order_id.clone());
        active.error = Set(job.error.clone());
        active.started_at = Set(job.started_at);
        active.finished_at = Set(job.finished_at);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<OrderJob>, BridgeError> {
        match order_jobs::Entity::find_by_id(job_id).one(&self.db).await? {
            Some(model) => Ok(Some(job_from_model(model)?)),
            None => Ok(None),
        }
    }
}
