//! Order job queue
//!
//! Order placement drives the same ERP login that the automation bot uses,
//! so jobs run strictly one at a time. Each job asserts the priority lock
//! (forcing background sync to yield), opens a fresh dedicated browser
//! session, and cleans up both no matter how the ERP interaction ends.
//! Failures are never retried automatically — the ERP may have accepted the
//! order even when the automation reports failure — but a manual retry
//! creates a brand-new job with the same payload.

use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::browser::pool::SessionPool;
use crate::config::OrderQueueConfig;
use crate::error::BridgeError;
use crate::models::order::OrderPayload;
use crate::services::erp_driver::ErpDriver;
use crate::services::orchestrator::SyncOrchestrator;
use crate::services::progress::{BridgeEvent, ProgressBroadcaster};
use crate::services::storage::{JobStatus, OrderJob, OrderJobStore};

pub struct OrderJobQueue {
    store: Arc<dyn OrderJobStore>,
    orchestrator: Arc<SyncOrchestrator>,
    pool: Arc<SessionPool>,
    driver: Arc<dyn ErpDriver>,
    progress: ProgressBroadcaster,
    config: OrderQueueConfig,
    tx: mpsc::Sender<Uuid>,
    rx: Mutex<Option<mpsc::Receiver<Uuid>>>,
    /// Handle to ourselves for the worker task
    this: Weak<OrderJobQueue>,
}

impl OrderJobQueue {
    pub fn new(
        store: Arc<dyn OrderJobStore>,
        orchestrator: Arc<SyncOrchestrator>,
        pool: Arc<SessionPool>,
        driver: Arc<dyn ErpDriver>,
        progress: ProgressBroadcaster,
        config: OrderQueueConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_depth);
        Arc::new_cyclic(|this| Self {
            store,
            orchestrator,
            pool,
            driver,
            progress,
            config,
            tx,
            rx: Mutex::new(Some(rx)),
            this: this.clone(),
        })
    }

    /// Start the single worker. Call once after construction.
    pub fn start(&self) {
        let Some(queue) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let Some(mut rx) = queue.rx.lock().await.take() else {
                tracing::warn!("Order queue worker already running");
                return;
            };
            while let Some(job_id) = rx.recv().await {
                queue.run_job(job_id).await;
            }
            tracing::info!("Order queue worker stopped");
        });
    }

    pub async fn enqueue(
        &self,
        user_id: String,
        payload: OrderPayload,
    ) -> Result<Uuid, BridgeError> {
        let job = OrderJob::new(user_id, payload, None);
        self.store.insert(&job).await?;
        self.submit(job).await
    }

    pub async fn status(&self, job_id: Uuid) -> Result<OrderJob, BridgeError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(BridgeError::JobNotFound(job_id))
    }

    /// Manual re-submission: a brand-new job with the old payload. Only
    /// failed jobs are eligible — re-running a completed order would place
    /// it twice.
    pub async fn retry(&self, job_id: Uuid) -> Result<Uuid, BridgeError> {
        let previous = self.status(job_id).await?;
        if previous.status != JobStatus::Failed {
            return Err(BridgeError::OrderFailed(format!(
                "job {} is {}, only failed jobs can be retried",
                job_id,
                previous.status.as_str()
            )));
        }

        let job = OrderJob::new(previous.user_id, previous.payload, Some(job_id));
        self.store.insert(&job).await?;
        tracing::info!("Order job {} resubmitted as {}", job_id, job.job_id);
        self.submit(job).await
    }

    async fn submit(&self, mut job: OrderJob) -> Result<Uuid, BridgeError> {
        let job_id = job.job_id;
        if self.tx.try_send(job_id).is_err() {
            job.status = JobStatus::Failed;
            job.error = Some("order queue is full".into());
            job.finished_at = Some(Utc::now().naive_utc());
            self.store.update(&job).await?;
            return Err(BridgeError::QueueFull);
        }
        Ok(job_id)
    }

    async fn run_job(&self, job_id: Uuid) {
        let mut job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!("Order job {} vanished before execution", job_id);
                return;
            }
            Err(e) => {
                tracing::error!("Loading order job {}: {}", job_id, e);
                return;
            }
        };

        job.status = JobStatus::Running;
        job.attempts += 1;
        job.started_at = Some(Utc::now().naive_utc());
        if let Err(e) = self.store.update(&job).await {
            tracing::error!("Marking order job {} running: {}", job_id, e);
        }
        self.progress.publish(BridgeEvent::OrderStarted { job_id });

        let result = self.execute(&job).await;

        job.finished_at = Some(Utc::now().naive_utc());
        match result {
            Ok(erp_order_id) => {
                tracing::info!("Order job {} completed as {}", job_id, erp_order_id);
                job.status = JobStatus::Completed;
                job.erp_order_id = Some(erp_order_id.clone());
                self.progress
                    .publish(BridgeEvent::OrderCompleted { job_id, erp_order_id });
            }
            Err(e) => {
                let error = e.to_string();
                tracing::error!("Order job {} failed: {}", job_id, error);
                job.status = JobStatus::Failed;
                job.error = Some(error.clone());
                self.progress
                    .publish(BridgeEvent::OrderFailed { job_id, error });
            }
        }
        if let Err(e) = self.store.update(&job).await {
            tracing::error!("Persisting order job {} outcome: {}", job_id, e);
        }
    }

    async fn execute(&self, job: &OrderJob) -> Result<String, BridgeError> {
        // Background sync must yield before the ERP is touched
        let lock_guard = self
            .orchestrator
            .begin_exclusive(self.config.lock_wait_interval, self.config.lock_max_attempts)
            .await?;

        // Orders always run in a fresh dedicated session: retried UI flows
        // must start from a clean slate, never a cached grid state.
        let session = self.pool.acquire_fresh(&job.user_id).await?;

        let result: Result<String, BridgeError> = async {
            self.driver.login(&session).await?;
            let order_id = tokio::time::timeout(
                self.config.order_timeout,
                self.driver.place_order(&session, &job.payload),
            )
            .await
            .map_err(|_| BridgeError::OrderFailed("ERP interaction timed out".into()))??;
            Ok(order_id)
        }
        .await;

        // Guaranteed cleanup on both outcomes: discard the session (closing
        // its context terminates any leaked automation), then release the
        // lock so the orchestrator resumes.
        self.pool.invalidate(&job.user_id).await;
        drop(lock_guard);

        result
    }
}
