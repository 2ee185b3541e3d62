//! Sync orchestrator
//!
//! The single authority over which domain syncs when. One domain runs at a
//! time; deferred requests sit in a priority queue with at most one entry per
//! domain. The fast path preempts the queue for one urgent domain while a
//! user is composing an order, and the priority lock makes the whole
//! orchestrator yield to order placement. A failed domain run is recorded
//! and never stops the drain loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};

use crate::browser::pool::SessionPool;
use crate::config::SyncConfig;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::models::sync::{CurrentRunView, FastPathView, OrchestratorStatus, QueuedRequestView};
use crate::services::delta_sync::{DeltaSyncEngine, SyncDomain, SyncOutcome};
use crate::services::erp_driver::ErpDriver;
use crate::services::priority_lock::{PriorityLock, PriorityLockGuard};

struct QueuedRequest {
    domain: Domain,
    priority: i32,
    seq: u64,
    requested_at: DateTime<Utc>,
    user_id: Option<String>,
}

struct CurrentRun {
    domain: Domain,
    started_at: DateTime<Utc>,
    user_id: Option<String>,
    stop_tx: watch::Sender<bool>,
}

struct FastPathState {
    domain: Domain,
    refcount: u32,
    deadline: Instant,
}

#[derive(Default)]
struct OrchestratorInner {
    queue: Vec<QueuedRequest>,
    current: Option<CurrentRun>,
    fast_path: Option<FastPathState>,
    seq: u64,
}

pub struct SyncOrchestrator {
    inner: parking_lot::Mutex<OrchestratorInner>,
    /// Pokes the drain loop: new request, slot freed, lock released
    wake: Arc<Notify>,
    /// Broadcast to order jobs waiting for the running slot to clear
    run_finished: Notify,
    pool: Arc<SessionPool>,
    engine: Arc<DeltaSyncEngine>,
    driver: Arc<dyn ErpDriver>,
    domains: HashMap<Domain, Arc<dyn SyncDomain>>,
    priority_lock: Arc<PriorityLock>,
    config: SyncConfig,
    shutting_down: AtomicBool,
    /// Handle to ourselves for the drain loop and run tasks
    this: Weak<SyncOrchestrator>,
}

impl SyncOrchestrator {
    pub fn new(
        pool: Arc<SessionPool>,
        engine: Arc<DeltaSyncEngine>,
        driver: Arc<dyn ErpDriver>,
        domains: HashMap<Domain, Arc<dyn SyncDomain>>,
        priority_lock: Arc<PriorityLock>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            inner: parking_lot::Mutex::new(OrchestratorInner::default()),
            wake: Arc::new(Notify::new()),
            run_finished: Notify::new(),
            pool,
            engine,
            driver,
            domains,
            priority_lock,
            config,
            shutting_down: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Start the drain loop. Call once after construction.
    pub fn start(&self) {
        self.priority_lock.notify_on_release(Arc::clone(&self.wake));

        let Some(orchestrator) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                if orchestrator.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                orchestrator.dispatch_next();
                tokio::select! {
                    _ = orchestrator.wake.notified() => {}
                    // Periodic tick backstops the fast-path safety timeout
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
            tracing::info!("Sync orchestrator drain loop stopped");
        });
    }

    /// Ask for a domain sync. A request for an already-queued domain raises
    /// its priority instead of duplicating the entry; a request for the
    /// running domain is a no-op.
    pub fn request_sync(&self, domain: Domain, priority: Option<i32>, user_id: Option<String>) {
        let priority = priority.unwrap_or_else(|| self.config.priority_for(domain));

        {
            let mut inner = self.inner.lock();

            if let Some(existing) = inner.queue.iter_mut().find(|r| r.domain == domain) {
                if priority > existing.priority {
                    tracing::debug!(
                        "[{}] Already queued, raising priority to {}",
                        domain,
                        priority
                    );
                    existing.priority = priority;
                }
                return;
            }

            if inner.current.as_ref().is_some_and(|c| c.domain == domain) {
                tracing::debug!("[{}] Already running, request folded", domain);
                return;
            }

            inner.seq += 1;
            let seq = inner.seq;
            inner.queue.push(QueuedRequest {
                domain,
                priority,
                seq,
                requested_at: Utc::now(),
                user_id,
            });
            tracing::info!("[{}] Sync queued with priority {}", domain, priority);
        }

        self.wake.notify_one();
    }

    /// Enter the fast path for `domain`: the queue stops draining for other
    /// domains and `domain` itself is requested at preemptive priority.
    /// Reference-counted; returns the new count.
    pub fn smart_fast_path(&self, domain: Domain) -> Result<u32, BridgeError> {
        let refcount = {
            let mut inner = self.inner.lock();
            match &mut inner.fast_path {
                Some(fp) if fp.domain == domain => {
                    fp.refcount += 1;
                    fp.deadline = Instant::now() + self.config.fast_path_timeout;
                    fp.refcount
                }
                Some(fp) => return Err(BridgeError::FastPathActive(fp.domain)),
                None => {
                    inner.fast_path = Some(FastPathState {
                        domain,
                        refcount: 1,
                        deadline: Instant::now() + self.config.fast_path_timeout,
                    });
                    1
                }
            }
        };

        tracing::info!("[{}] Fast path entered (refcount {})", domain, refcount);
        self.request_sync(domain, Some(self.config.fast_path_priority), None);
        self.wake.notify_one();
        Ok(refcount)
    }

    /// Leave the fast path. Only the transition to zero resumes the queue;
    /// returns the remaining count.
    pub fn end_fast_path(&self) -> u32 {
        let remaining = {
            let mut inner = self.inner.lock();
            let Some(fp) = inner.fast_path.as_mut() else {
                return 0;
            };
            fp.refcount = fp.refcount.saturating_sub(1);
            let remaining = fp.refcount;
            if remaining == 0 {
                let domain = fp.domain;
                inner.fast_path = None;
                tracing::info!("[{}] Fast path ended, resuming queue", domain);
            } else {
                tracing::debug!("[{}] Fast path exit, refcount now {}", fp.domain, remaining);
            }
            remaining
        };

        if remaining == 0 {
            self.wake.notify_one();
        }
        remaining
    }

    pub fn status(&self) -> OrchestratorStatus {
        let inner = self.inner.lock();

        let mut queue: Vec<&QueuedRequest> = inner.queue.iter().collect();
        queue.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        OrchestratorStatus {
            current: inner.current.as_ref().map(|run| CurrentRunView {
                domain: run.domain,
                started_at: run.started_at,
                user_id: run.user_id.clone(),
            }),
            queue: queue
                .into_iter()
                .map(|r| QueuedRequestView {
                    domain: r.domain,
                    priority: r.priority,
                    requested_at: r.requested_at,
                    user_id: r.user_id.clone(),
                })
                .collect(),
            fast_path: inner.fast_path.as_ref().map(|fp| FastPathView {
                domain: fp.domain,
                refcount: fp.refcount,
                remaining_secs: fp.deadline.saturating_duration_since(Instant::now()).as_secs(),
            }),
        }
    }

    pub fn running_domain(&self) -> Option<Domain> {
        self.inner.lock().current.as_ref().map(|c| c.domain)
    }

    /// Assert the priority lock for an order job, then wait (bounded) for the
    /// running slot to clear. The raised lock makes a running engine pause at
    /// its next page boundary, so the wait normally resolves within one page.
    pub async fn begin_exclusive(
        &self,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<PriorityLockGuard, BridgeError> {
        let Some(guard) = self.priority_lock.raise() else {
            return Err(BridgeError::LockTimeout { attempts: 0 });
        };
        self.wake.notify_one();

        let mut attempts: u32 = 0;
        loop {
            if self.inner.lock().current.is_none() {
                return Ok(guard);
            }
            attempts += 1;
            if attempts > max_attempts {
                tracing::warn!(
                    "Order gave up waiting for sync slot after {} attempts",
                    max_attempts
                );
                // guard drops here, releasing the lock
                return Err(BridgeError::LockTimeout {
                    attempts: max_attempts,
                });
            }
            let _ = tokio::time::timeout(interval, self.run_finished.notified()).await;
        }
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        {
            let mut inner = self.inner.lock();
            inner.queue.clear();
            if let Some(current) = &inner.current {
                let _ = current.stop_tx.send(true);
            }
        }
        self.wake.notify_one();
    }

    // -- drain loop internals ------------------------------------------------

    fn dispatch_next(&self) {
        let dispatched = {
            let mut inner = self.inner.lock();

            let expired = inner
                .fast_path
                .as_ref()
                .is_some_and(|fp| Instant::now() >= fp.deadline);
            if expired {
                if let Some(fp) = inner.fast_path.take() {
                    tracing::warn!(
                        "[{}] Fast path leaked (refcount {}), force-ending after safety timeout",
                        fp.domain,
                        fp.refcount
                    );
                }
            }

            if inner.current.is_some() || self.priority_lock.is_held() {
                return;
            }

            let index = match &inner.fast_path {
                // Fast path active: only its own domain may start
                Some(fp) => {
                    let domain = fp.domain;
                    inner.queue.iter().position(|r| r.domain == domain)
                }
                None => inner
                    .queue
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| {
                        a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq))
                    })
                    .map(|(index, _)| index),
            };

            let Some(index) = index else { return };
            let request = inner.queue.remove(index);
            let (stop_tx, stop_rx) = watch::channel(false);
            inner.current = Some(CurrentRun {
                domain: request.domain,
                started_at: Utc::now(),
                user_id: request.user_id.clone(),
                stop_tx,
            });
            Some((request, stop_rx))
        };

        if let Some((request, stop_rx)) = dispatched {
            let Some(orchestrator) = self.this.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                orchestrator.run_domain(request, stop_rx).await;
            });
        }
    }

    async fn run_domain(&self, request: QueuedRequest, stop_rx: watch::Receiver<bool>) {
        let domain = request.domain;
        let outcome = self.execute_run(domain, stop_rx).await;

        {
            let mut inner = self.inner.lock();
            inner.current = None;
        }
        self.run_finished.notify_waiters();
        self.wake.notify_one();

        match outcome {
            Ok(SyncOutcome::Completed(report)) => {
                tracing::info!(
                    "[{}] Run finished: {} pages, {} inserted, {} updated",
                    domain,
                    report.pages,
                    report.inserted,
                    report.updated
                );
            }
            Ok(SyncOutcome::Skipped) => {}
            Ok(SyncOutcome::Stopped { last_page }) => {
                tracing::info!("[{}] Run yielded at page {}", domain, last_page);
                // Paused, not failed: put it back so it resumes once the
                // order (or stop condition) has cleared.
                if !self.shutting_down.load(Ordering::SeqCst) {
                    self.request_sync(domain, Some(request.priority), request.user_id);
                }
            }
            // Failures are contained per run; the queue keeps draining
            Err(e) => {
                tracing::error!("[{}] Run failed: {}", domain, e);
            }
        }
    }

    async fn execute_run(
        &self,
        domain: Domain,
        stop_rx: watch::Receiver<bool>,
    ) -> Result<SyncOutcome, BridgeError> {
        let Some(adapter) = self.domains.get(&domain) else {
            return Err(BridgeError::SyncFailed {
                domain,
                message: "no adapter registered".into(),
            });
        };

        let sync_user = self.config.sync_user.clone();
        let session = self.pool.acquire(&sync_user).await?;

        if let Err(e) = self.driver.login(&session).await {
            self.pool.release(&sync_user, &session, false).await;
            return Err(e);
        }

        let result = self.engine.run(adapter.as_ref(), &session, stop_rx).await;
        self.pool
            .release(&sync_user, &session, result.is_ok())
            .await;
        result
    }
}
