//! Browser session pool
//!
//! Owns a fixed set of browser processes and issues per-user isolated
//! sessions from them. One live lease per user, least-loaded process
//! placement, LRU eviction at capacity, cookie validation on reuse, and
//! transparent purge + relaunch when a process dies. The pool never queues:
//! with no connected process left, `acquire` fails fast with `PoolExhausted`
//! and callers retry with backoff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::browser::backend::{BrowserBackend, BrowserProcess, BrowserSession};
use crate::config::PoolConfig;
use crate::error::BridgeError;
use crate::models::pool::{LeaseStats, PoolStats, ProcessStats};

struct Lease {
    session: BrowserSession,
    created_at: Instant,
    last_used: Instant,
}

struct Slot {
    process: Option<Arc<dyn BrowserProcess>>,
    open_sessions: usize,
    relaunching: bool,
}

struct PoolInner {
    slots: Vec<Slot>,
    leases: HashMap<String, Lease>,
}

impl PoolInner {
    fn total_sessions(&self) -> usize {
        self.slots.iter().map(|s| s.open_sessions).sum()
    }

    /// Connected slot with the fewest open sessions and spare capacity.
    fn pick_slot(&self, sessions_per_process: usize) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.open_sessions < sessions_per_process
                    && slot
                        .process
                        .as_ref()
                        .is_some_and(|p| p.is_connected())
            })
            .min_by_key(|(_, slot)| slot.open_sessions)
            .map(|(index, _)| index)
    }

    fn lru_user(&self) -> Option<String> {
        self.leases
            .iter()
            .min_by_key(|(user, lease)| (lease.last_used, (*user).clone()))
            .map(|(user, _)| user.clone())
    }
}

pub struct SessionPool {
    backend: Arc<dyn BrowserBackend>,
    config: PoolConfig,
    inner: Mutex<PoolInner>,
    /// Serializes concurrent acquisitions for the same user so a session is
    /// never created twice for one login.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    closed: AtomicBool,
    /// Handle to ourselves for the watcher/relaunch tasks
    this: Weak<SessionPool>,
}

impl SessionPool {
    pub fn new(backend: Arc<dyn BrowserBackend>, config: PoolConfig) -> Arc<Self> {
        let slots = (0..config.processes)
            .map(|_| Slot {
                process: None,
                open_sessions: 0,
                relaunching: false,
            })
            .collect();

        Arc::new_cyclic(|this| Self {
            backend,
            config,
            inner: Mutex::new(PoolInner {
                slots,
                leases: HashMap::new(),
            }),
            user_locks: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.processes * self.config.sessions_per_process
    }

    /// Launch the browser fleet. Individual launch failures are retried in
    /// the background; only a fleet-wide failure is an error.
    pub async fn initialize(&self) -> Result<(), BridgeError> {
        let mut launched = 0;
        for index in 0..self.config.processes {
            match self.backend.launch(index).await {
                Ok(process) => {
                    self.install_process(index, process).await;
                    launched += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to launch browser process {}: {}", index, e);
                    self.schedule_relaunch(index).await;
                }
            }
        }

        if launched == 0 {
            return Err(BridgeError::PoolExhausted);
        }
        tracing::info!(
            "Browser pool initialized: {}/{} processes up, capacity {}",
            launched,
            self.config.processes,
            self.capacity()
        );
        Ok(())
    }

    /// Get a working session for `user_id`, reusing a validated cached lease
    /// when possible. Callers never observe expiry: an invalid lease is
    /// replaced transparently.
    pub async fn acquire(&self, user_id: &str) -> Result<BrowserSession, BridgeError> {
        let user_lock = self.user_lock(user_id).await;
        let _guard = user_lock.lock().await;

        if let Some(session) = self.try_reuse(user_id).await {
            return Ok(session);
        }
        self.create_session(user_id).await
    }

    /// Always discard any cached lease and open a brand-new session. Order
    /// placement uses this so retried UI flows start from a clean slate.
    pub async fn acquire_fresh(
        &self,
        user_id: &str,
    ) -> Result<BrowserSession, BridgeError> {
        let user_lock = self.user_lock(user_id).await;
        let _guard = user_lock.lock().await;

        self.remove_lease(user_id, true).await;
        self.create_session(user_id).await
    }

    /// Hand a session back. A failed operation taints the session, so the
    /// lease is evicted; a successful one marks it idle for reuse.
    pub async fn release(&self, user_id: &str, session: &BrowserSession, success: bool) {
        let evict = {
            let mut inner = self.inner.lock().await;
            match inner.leases.get_mut(user_id) {
                Some(lease) if lease.session.context_id == session.context_id => {
                    if success {
                        lease.last_used = Instant::now();
                        false
                    } else {
                        true
                    }
                }
                // Stale handle: the lease was already replaced or purged
                _ => return,
            }
        };

        if evict {
            tracing::debug!("Evicting tainted session for {}", user_id);
            self.remove_lease(user_id, true).await;
        }
    }

    /// Drop a user's lease and close its context, if any.
    pub async fn invalidate(&self, user_id: &str) {
        self.remove_lease(user_id, true).await;
    }

    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        PoolStats {
            capacity: self.capacity(),
            open_sessions: inner.total_sessions(),
            processes: inner
                .slots
                .iter()
                .enumerate()
                .map(|(index, slot)| ProcessStats {
                    index,
                    connected: slot.process.as_ref().is_some_and(|p| p.is_connected()),
                    open_sessions: slot.open_sessions,
                })
                .collect(),
            leases: inner
                .leases
                .iter()
                .map(|(user, lease)| LeaseStats {
                    user_id: user.clone(),
                    process_index: lease.session.process_index,
                    age_secs: lease.created_at.elapsed().as_secs(),
                    idle_secs: lease.last_used.elapsed().as_secs(),
                })
                .collect(),
        }
    }

    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let (leases, processes) = {
            let mut inner = self.inner.lock().await;
            let leases: Vec<(String, BrowserSession)> = inner
                .leases
                .drain()
                .map(|(user, lease)| (user, lease.session))
                .collect();
            for slot in &mut inner.slots {
                slot.open_sessions = 0;
            }
            let processes: Vec<Arc<dyn BrowserProcess>> = inner
                .slots
                .iter_mut()
                .filter_map(|slot| slot.process.take())
                .collect();
            (leases, processes)
        };

        for (user, session) in leases {
            if let Some(process) = processes
                .iter()
                .find(|p| p.index() == session.process_index)
            {
                if let Err(e) = process.close_context(&session).await {
                    tracing::debug!("Closing session for {} during shutdown: {}", user, e);
                }
            }
        }
        for process in processes {
            process.kill();
        }
        tracing::info!("Browser pool shut down");
    }

    // -- internals ----------------------------------------------------------

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn process_for(&self, index: usize) -> Option<Arc<dyn BrowserProcess>> {
        let inner = self.inner.lock().await;
        inner.slots.get(index).and_then(|slot| slot.process.clone())
    }

    /// Reuse the cached lease when it is young enough and still logged in.
    async fn try_reuse(&self, user_id: &str) -> Option<BrowserSession> {
        let (session, created_at) = {
            let inner = self.inner.lock().await;
            let lease = inner.leases.get(user_id)?;
            (lease.session.clone(), lease.created_at)
        };

        if created_at.elapsed() < self.config.lease_expiry {
            if let Some(process) = self.process_for(session.process_index).await {
                let valid = tokio::time::timeout(
                    self.config.validation_timeout,
                    process.validate(&session),
                )
                .await
                .map(|r| r.unwrap_or(false))
                .unwrap_or(false);

                if valid {
                    let mut inner = self.inner.lock().await;
                    if let Some(lease) = inner.leases.get_mut(user_id) {
                        lease.last_used = Instant::now();
                    }
                    return Some(session);
                }
            }
        }

        tracing::debug!("Cached session for {} invalid or expired, recreating", user_id);
        self.remove_lease(user_id, true).await;
        None
    }

    async fn create_session(&self, user_id: &str) -> Result<BrowserSession, BridgeError> {
        let (process, evicted) = {
            let mut inner = self.inner.lock().await;

            let mut evicted = None;
            let slot_index = match inner.pick_slot(self.config.sessions_per_process) {
                Some(index) => index,
                None => {
                    // At capacity (or every free slot is disconnected): push
                    // out the least-recently-used lease.
                    let Some(lru) = inner.lru_user() else {
                        return Err(BridgeError::PoolExhausted);
                    };
                    let Some(lease) = inner.leases.remove(&lru) else {
                        return Err(BridgeError::PoolExhausted);
                    };
                    let index = lease.session.process_index;
                    if let Some(slot) = inner.slots.get_mut(index) {
                        slot.open_sessions = slot.open_sessions.saturating_sub(1);
                    }
                    tracing::info!(
                        "Pool at capacity: evicting least-recently-used lease of {}",
                        lru
                    );
                    evicted = inner
                        .slots
                        .get(index)
                        .and_then(|slot| slot.process.clone())
                        .map(|process| (process, lease.session));

                    inner
                        .pick_slot(self.config.sessions_per_process)
                        .ok_or(BridgeError::PoolExhausted)?
                }
            };

            let slot = &mut inner.slots[slot_index];
            let process = slot.process.clone().ok_or(BridgeError::PoolExhausted)?;
            // Reserve the seat before the await below so concurrent callers
            // see correct utilization.
            slot.open_sessions += 1;
            (process, evicted)
        };

        if let Some((evicted_process, evicted_session)) = evicted {
            if let Err(e) = evicted_process.close_context(&evicted_session).await {
                tracing::debug!("Closing evicted session: {}", e);
            }
        }

        match process.open_context(user_id).await {
            Ok(session) => {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                inner.leases.insert(
                    user_id.to_string(),
                    Lease {
                        session: session.clone(),
                        created_at: now,
                        last_used: now,
                    },
                );
                Ok(session)
            }
            Err(e) => {
                let mut inner = self.inner.lock().await;
                if let Some(slot) = inner.slots.get_mut(process.index()) {
                    slot.open_sessions = slot.open_sessions.saturating_sub(1);
                }
                Err(e)
            }
        }
    }

    async fn remove_lease(&self, user_id: &str, close: bool) -> bool {
        let removed = {
            let mut inner = self.inner.lock().await;
            let Some(lease) = inner.leases.remove(user_id) else {
                return false;
            };
            let index = lease.session.process_index;
            if let Some(slot) = inner.slots.get_mut(index) {
                slot.open_sessions = slot.open_sessions.saturating_sub(1);
            }
            let process = inner.slots.get(index).and_then(|slot| slot.process.clone());
            Some((lease.session, process))
        };

        if let Some((session, Some(process))) = removed {
            if close {
                if let Err(e) = process.close_context(&session).await {
                    tracing::debug!("Closing context for {}: {}", user_id, e);
                }
            }
            true
        } else {
            true
        }
    }

    fn install_process<'a>(
        &'a self,
        index: usize,
        process: Arc<dyn BrowserProcess>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut inner = self.inner.lock().await;
                let slot = &mut inner.slots[index];
                slot.process = Some(Arc::clone(&process));
                slot.open_sessions = 0;
                slot.relaunching = false;
            }

            // Observe the process for disconnection
            let Some(pool) = self.this.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                process.closed().await;
                if pool.closed.load(Ordering::SeqCst) {
                    return;
                }
                pool.handle_disconnect(index).await;
            });
        })
    }

    async fn handle_disconnect(&self, index: usize) {
        let purged = {
            let mut inner = self.inner.lock().await;
            let slot = &mut inner.slots[index];
            slot.process = None;
            slot.open_sessions = 0;
            let before = inner.leases.len();
            inner
                .leases
                .retain(|_, lease| lease.session.process_index != index);
            before - inner.leases.len()
        };

        tracing::warn!(
            "Browser process {} disconnected, purged {} leases, relaunching",
            index,
            purged
        );
        self.schedule_relaunch(index).await;
    }

    async fn schedule_relaunch(&self, index: usize) {
        {
            let mut inner = self.inner.lock().await;
            let slot = &mut inner.slots[index];
            if slot.relaunching {
                return;
            }
            slot.relaunching = true;
        }

        let Some(pool) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                if pool.closed.load(Ordering::SeqCst) {
                    return;
                }
                match pool.backend.launch(index).await {
                    Ok(process) => {
                        tracing::info!("Browser process {} relaunched", index);
                        pool.install_process(index, process).await;
                        return;
                    }
                    Err(e) => {
                        tracing::error!("Relaunch of browser process {} failed: {}", index, e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });
    }
}
