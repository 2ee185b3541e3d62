//! Shared test doubles for the arbitration core: an in-memory browser
//! backend, a scripted automation driver, in-memory storage and controllable
//! sync domains.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use archibald_bridge::browser::backend::{BrowserBackend, BrowserProcess, BrowserSession};
use archibald_bridge::browser::pool::SessionPool;
use archibald_bridge::config::{OrderQueueConfig, PoolConfig, SyncConfig};
use archibald_bridge::error::BridgeError;
use archibald_bridge::models::domain::Domain;
use archibald_bridge::models::order::OrderPayload;
use archibald_bridge::services::delta_sync::{
    DeltaSyncEngine, MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use archibald_bridge::services::erp_driver::{ErpDriver, ScrapedRecord};
use archibald_bridge::services::order_queue::OrderJobQueue;
use archibald_bridge::services::orchestrator::SyncOrchestrator;
use archibald_bridge::services::priority_lock::PriorityLock;
use archibald_bridge::services::progress::ProgressBroadcaster;
use archibald_bridge::services::storage::{
    ChangeEntry, ChangeLog, Checkpoint, CheckpointStore, OrderJob, OrderJobStore,
    clamp_resume_point,
};

// ---------------------------------------------------------------------------
// Browser backend double

pub struct MockProcess {
    index: usize,
    opened: AtomicUsize,
    alive_tx: watch::Sender<bool>,
    alive_rx: watch::Receiver<bool>,
}

impl MockProcess {
    fn new(index: usize) -> Arc<Self> {
        let (alive_tx, alive_rx) = watch::channel(true);
        Arc::new(Self {
            index,
            opened: AtomicUsize::new(0),
            alive_tx,
            alive_rx,
        })
    }

    pub fn crash(&self) {
        let _ = self.alive_tx.send(false);
    }
}

#[async_trait]
impl BrowserProcess for MockProcess {
    fn index(&self) -> usize {
        self.index
    }

    async fn open_context(&self, user_id: &str) -> Result<BrowserSession, BridgeError> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(BrowserSession {
            user_id: user_id.to_string(),
            process_index: self.index,
            context_id: format!("ctx-{}-{}", self.index, n),
            target_id: format!("target-{}-{}", self.index, n),
            ws_url: "ws://mock".into(),
            created_at: Utc::now(),
        })
    }

    async fn close_context(&self, _session: &BrowserSession) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn validate(&self, _session: &BrowserSession) -> Result<bool, BridgeError> {
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        *self.alive_rx.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.alive_rx.clone();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn kill(&self) {
        let _ = self.alive_tx.send(false);
    }
}

pub struct MockBackend {
    pub processes: parking_lot::Mutex<Vec<Arc<MockProcess>>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            processes: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BrowserBackend for MockBackend {
    async fn launch(&self, index: usize) -> Result<Arc<dyn BrowserProcess>, BridgeError> {
        let process = MockProcess::new(index);
        self.processes.lock().push(Arc::clone(&process));
        Ok(process)
    }
}

// ---------------------------------------------------------------------------
// Automation driver double

/// Records order placements; `fail_orders` scripts ERP-side failures. The
/// `sync_pages_active` probe is shared with the controlled domains so the
/// driver can detect an order overlapping a page fetch.
pub struct MockDriver {
    pub orders_placed: parking_lot::Mutex<Vec<OrderPayload>>,
    pub fail_orders: AtomicBool,
    pub sync_pages_active: Arc<AtomicUsize>,
    pub overlap_detected: AtomicBool,
    pub order_counter: AtomicUsize,
}

impl MockDriver {
    pub fn new(sync_pages_active: Arc<AtomicUsize>) -> Arc<Self> {
        Arc::new(Self {
            orders_placed: parking_lot::Mutex::new(Vec::new()),
            fail_orders: AtomicBool::new(false),
            sync_pages_active,
            overlap_detected: AtomicBool::new(false),
            order_counter: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ErpDriver for MockDriver {
    async fn login(&self, _session: &BrowserSession) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn count_pages(
        &self,
        _session: &BrowserSession,
        _domain: Domain,
    ) -> Result<u32, BridgeError> {
        Ok(0)
    }

    async fn scrape_page(
        &self,
        _session: &BrowserSession,
        _domain: Domain,
        _page: u32,
    ) -> Result<Vec<ScrapedRecord>, BridgeError> {
        Ok(Vec::new())
    }

    async fn download_export(
        &self,
        _session: &BrowserSession,
        _domain: Domain,
    ) -> Result<PathBuf, BridgeError> {
        Err(BridgeError::Driver("no exports in tests".into()))
    }

    async fn place_order(
        &self,
        _session: &BrowserSession,
        order: &OrderPayload,
    ) -> Result<String, BridgeError> {
        if self.sync_pages_active.load(Ordering::SeqCst) > 0 {
            self.overlap_detected.store(true, Ordering::SeqCst);
        }
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(BridgeError::Driver("order form rejected".into()));
        }
        self.orders_placed.lock().push(order.clone());
        let n = self.order_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ORD/2600{:04}", n))
    }
}

// ---------------------------------------------------------------------------
// In-memory storage

pub struct MemCheckpointStore {
    map: parking_lot::Mutex<HashMap<Domain, Checkpoint>>,
}

impl MemCheckpointStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            map: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    pub fn snapshot(&self, domain: Domain) -> Checkpoint {
        self.map
            .lock()
            .get(&domain)
            .cloned()
            .unwrap_or_else(|| Checkpoint::fresh(domain))
    }
}

#[async_trait]
impl CheckpointStore for MemCheckpointStore {
    async fn get(&self, domain: Domain) -> Result<Checkpoint, BridgeError> {
        Ok(self.snapshot(domain))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), BridgeError> {
        let mut map = self.map.lock();
        let mut incoming = checkpoint.clone();
        if let Some(existing) = map.get(&checkpoint.domain) {
            clamp_resume_point(existing, &mut incoming);
        }
        map.insert(checkpoint.domain, incoming);
        Ok(())
    }

    async fn reset(&self, domain: Domain) -> Result<(), BridgeError> {
        self.map.lock().insert(domain, Checkpoint::fresh(domain));
        Ok(())
    }
}

pub struct MemChangeLog {
    pub entries: parking_lot::Mutex<Vec<ChangeEntry>>,
}

impl MemChangeLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChangeLog for MemChangeLog {
    async fn record(&self, entries: Vec<ChangeEntry>) -> Result<(), BridgeError> {
        self.entries.lock().extend(entries);
        Ok(())
    }
}

pub struct MemOrderJobStore {
    jobs: parking_lot::Mutex<HashMap<Uuid, OrderJob>>,
}

impl MemOrderJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    pub fn get_sync(&self, job_id: Uuid) -> Option<OrderJob> {
        self.jobs.lock().get(&job_id).cloned()
    }
}

#[async_trait]
impl OrderJobStore for MemOrderJobStore {
    async fn insert(&self, job: &OrderJob) -> Result<(), BridgeError> {
        self.jobs.lock().insert(job.job_id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &OrderJob) -> Result<(), BridgeError> {
        self.jobs.lock().insert(job.job_id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<OrderJob>, BridgeError> {
        Ok(self.jobs.lock().get(&job_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Controllable sync domain

/// A scripted domain: a fixed number of pages, a watch-channel gate to hold a
/// fetch open mid-run, and shared probes for concurrency and execution order.
pub struct ControlledDomain {
    domain: Domain,
    pages: u32,
    page_delay: Duration,
    gate_rx: watch::Receiver<bool>,
    stored: parking_lot::Mutex<HashMap<String, StoredRecord>>,
    pub pages_active: Arc<AtomicUsize>,
    pub max_pages_active: Arc<AtomicUsize>,
    pub run_order: Arc<parking_lot::Mutex<Vec<Domain>>>,
}

pub struct DomainControls {
    pub gate_tx: watch::Sender<bool>,
}

impl DomainControls {
    /// Hold every subsequent page fetch until `open` is called.
    pub fn close_gate(&self) {
        let _ = self.gate_tx.send(true);
    }

    pub fn open_gate(&self) {
        let _ = self.gate_tx.send(false);
    }
}

impl ControlledDomain {
    pub fn new(
        domain: Domain,
        pages: u32,
        page_delay: Duration,
        pages_active: Arc<AtomicUsize>,
        max_pages_active: Arc<AtomicUsize>,
        run_order: Arc<parking_lot::Mutex<Vec<Domain>>>,
    ) -> (Arc<Self>, DomainControls) {
        let (gate_tx, gate_rx) = watch::channel(false);
        (
            Arc::new(Self {
                domain,
                pages,
                page_delay,
                gate_rx,
                stored: parking_lot::Mutex::new(HashMap::new()),
                pages_active,
                max_pages_active,
                run_order,
            }),
            DomainControls { gate_tx },
        )
    }
}

#[async_trait]
impl SyncDomain for ControlledDomain {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Ignore
    }

    async fn total_pages(&self, _session: &BrowserSession) -> Result<u32, BridgeError> {
        self.run_order.lock().push(self.domain);
        Ok(self.pages)
    }

    async fn fetch_page(
        &self,
        _session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let active = self.pages_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_pages_active.fetch_max(active, Ordering::SeqCst);

        let mut gate = self.gate_rx.clone();
        while *gate.borrow() {
            if gate.changed().await.is_err() {
                break;
            }
        }
        tokio::time::sleep(self.page_delay).await;

        self.pages_active.fetch_sub(1, Ordering::SeqCst);

        Ok(vec![SourceRecord {
            id: format!("{}-{}", self.domain, page),
            fields: vec![("name", Some(format!("record {}", page)))],
        }])
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(self.stored.lock().get(id).cloned())
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        self.stored.lock().insert(
            record.id.clone(),
            StoredRecord {
                content_hash: content_hash.to_string(),
                fields: record.fields.clone(),
            },
        );
        Ok(())
    }

    async fn known_ids(&self) -> Result<HashSet<String>, BridgeError> {
        Ok(self.stored.lock().keys().cloned().collect())
    }

    async fn deactivate(&self, _ids: &[String]) -> Result<u64, BridgeError> {
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// Full harness

pub struct Harness {
    pub pool: Arc<SessionPool>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub queue: Arc<OrderJobQueue>,
    pub driver: Arc<MockDriver>,
    pub checkpoints: Arc<MemCheckpointStore>,
    pub changes: Arc<MemChangeLog>,
    pub jobs: Arc<MemOrderJobStore>,
    pub controls: HashMap<Domain, DomainControls>,
    pub max_pages_active: Arc<AtomicUsize>,
    pub run_order: Arc<parking_lot::Mutex<Vec<Domain>>>,
    pub progress: ProgressBroadcaster,
}

pub fn test_pool_config() -> PoolConfig {
    PoolConfig {
        processes: 3,
        sessions_per_process: 2,
        lease_expiry: Duration::from_secs(600),
        validation_timeout: Duration::from_secs(1),
        devtools_base_port: 0,
        chromium_binary: "chromium".into(),
        required_cookies: vec![],
        erp_origin: "https://erp.test".into(),
    }
}

pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        freshness_window: Duration::ZERO,
        fast_path_timeout: Duration::from_secs(60),
        fast_path_priority: 1000,
        sync_user: "sync-service".into(),
        priorities: HashMap::from([
            (Domain::Orders, 60),
            (Domain::Customers, 50),
            (Domain::TransportDocuments, 40),
            (Domain::Invoices, 30),
            (Domain::Products, 20),
            (Domain::Prices, 10),
        ]),
        intervals: HashMap::new(),
    }
}

pub fn test_order_config() -> OrderQueueConfig {
    OrderQueueConfig {
        lock_wait_interval: Duration::from_millis(20),
        lock_max_attempts: 100,
        queue_depth: 16,
        order_timeout: Duration::from_secs(5),
    }
}

/// Wire up pool, engine, orchestrator and order queue with `pages` pages per
/// domain, all backed by the shared in-memory doubles. Both background loops
/// are started.
pub async fn build_harness(
    pages: u32,
    page_delay: Duration,
    sync_config: SyncConfig,
    order_config: OrderQueueConfig,
) -> Harness {
    let backend = MockBackend::new();
    let pool = SessionPool::new(backend as Arc<dyn BrowserBackend>, test_pool_config());
    pool.initialize().await.unwrap();

    let pages_active = Arc::new(AtomicUsize::new(0));
    let max_pages_active = Arc::new(AtomicUsize::new(0));
    let run_order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut domains: HashMap<Domain, Arc<dyn SyncDomain>> = HashMap::new();
    let mut controls = HashMap::new();
    for domain in Domain::ALL {
        let (adapter, control) = ControlledDomain::new(
            domain,
            pages,
            page_delay,
            Arc::clone(&pages_active),
            Arc::clone(&max_pages_active),
            Arc::clone(&run_order),
        );
        domains.insert(domain, adapter as Arc<dyn SyncDomain>);
        controls.insert(domain, control);
    }

    let driver = MockDriver::new(Arc::clone(&pages_active));
    let checkpoints = MemCheckpointStore::new();
    let changes = MemChangeLog::new();
    let jobs = MemOrderJobStore::new();
    let progress = ProgressBroadcaster::new();
    let priority_lock = PriorityLock::new();

    let engine = DeltaSyncEngine::new(
        Arc::clone(&checkpoints) as Arc<dyn CheckpointStore>,
        Arc::clone(&changes) as Arc<dyn ChangeLog>,
        progress.clone(),
        Arc::clone(&priority_lock),
        sync_config.freshness_window,
    );

    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&pool),
        engine,
        Arc::clone(&driver) as Arc<dyn ErpDriver>,
        domains,
        priority_lock,
        sync_config,
    );
    orchestrator.start();

    let queue = OrderJobQueue::new(
        Arc::clone(&jobs) as Arc<dyn OrderJobStore>,
        Arc::clone(&orchestrator),
        Arc::clone(&pool),
        Arc::clone(&driver) as Arc<dyn ErpDriver>,
        progress.clone(),
        order_config,
    );
    queue.start();

    Harness {
        pool,
        orchestrator,
        queue,
        driver,
        checkpoints,
        changes,
        jobs,
        controls,
        max_pages_active,
        run_order,
        progress,
    }
}

/// Poll until `predicate` holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

pub fn payload(customer: &str) -> OrderPayload {
    OrderPayload {
        customer_account: customer.to_string(),
        lines: vec![archibald_bridge::models::order::OrderLine {
            article_id: "ART-1".into(),
            quantity: 2,
            variant: None,
        }],
        customer_reference: None,
    }
}
