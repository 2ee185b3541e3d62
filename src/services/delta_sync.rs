//! Checkpointed delta sync engine
//!
//! Drives one domain through paginated extraction with durable, resumable
//! progress. Every item is hashed over its meaningful fields; only genuinely
//! new or changed records are written, each change leaving a field-level
//! audit entry. The checkpoint is persisted after every page, so a crash
//! loses at most one page of work, and cooperative stop requests (or an
//! order asserting the priority lock) pause the run at the next page or
//! write boundary instead of failing it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use uuid::Uuid;

use crate::browser::backend::BrowserSession;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::priority_lock::PriorityLock;
use crate::services::progress::{BridgeEvent, ProgressBroadcaster, SyncPhase};
use crate::services::storage::{
    ChangeEntry, ChangeLog, ChangeType, Checkpoint, CheckpointState, CheckpointStore,
};

/// One record as fetched from the source, normalized to canonical field
/// strings (ISO dates, plain decimals) so hashing and diffing are stable.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: String,
    pub fields: Vec<(&'static str, Option<String>)>,
}

/// The stored counterpart of a source record: its content hash plus the same
/// canonical field list, loaded in one query.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub content_hash: String,
    pub fields: Vec<(&'static str, Option<String>)>,
}

/// What to do with ids that disappeared from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Registries: clear the `active` flag, keep the row
    Deactivate,
    /// Documents: the ERP hides old entries from the grid; absence is not
    /// deletion
    Ignore,
}

/// One sync domain as seen by the engine: paginated fetch plus narrow
/// storage operations. Implementations live in `crate::domains`.
#[async_trait]
pub trait SyncDomain: Send + Sync {
    fn domain(&self) -> Domain;

    fn missing_policy(&self) -> MissingPolicy;

    /// Page count as the source reports it right now; re-derived every run
    /// because it drifts.
    async fn total_pages(&self, session: &BrowserSession) -> Result<u32, BridgeError>;

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError>;

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError>;

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError>;

    async fn known_ids(&self) -> Result<HashSet<String>, BridgeError>;

    async fn deactivate(&self, ids: &[String]) -> Result<u64, BridgeError>;
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub domain: Domain,
    pub run_id: Uuid,
    pub pages: u32,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Completed recently enough that the run was skipped entirely
    Skipped,
    Completed(SyncReport),
    /// Controlled pause, checkpoint left at the last committed page
    Stopped { last_page: u32 },
}

/// Hash over the canonical field list; the sole signal for change detection.
pub fn content_hash(fields: &[(&'static str, Option<String>)]) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
        if let Some(value) = value {
            hasher.update(value.as_bytes());
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

enum Applied {
    Created,
    Updated,
    Unchanged,
}

pub struct DeltaSyncEngine {
    checkpoints: Arc<dyn CheckpointStore>,
    changes: Arc<dyn ChangeLog>,
    progress: ProgressBroadcaster,
    priority_lock: Arc<PriorityLock>,
    freshness_window: Duration,
}

impl DeltaSyncEngine {
    pub fn new(
        checkpoints: Arc<dyn CheckpointStore>,
        changes: Arc<dyn ChangeLog>,
        progress: ProgressBroadcaster,
        priority_lock: Arc<PriorityLock>,
        freshness_window: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            checkpoints,
            changes,
            progress,
            priority_lock,
            freshness_window,
        })
    }

    /// Run one domain sync to completion, pause or failure. A failure marks
    /// the checkpoint but is otherwise contained: the checkpoint keeps the
    /// last page that was actually committed.
    pub async fn run(
        &self,
        adapter: &dyn SyncDomain,
        session: &BrowserSession,
        stop: watch::Receiver<bool>,
    ) -> Result<SyncOutcome, BridgeError> {
        let domain = adapter.domain();
        let mut checkpoint = self.checkpoints.get(domain).await?;

        if self.is_fresh(&checkpoint) {
            tracing::info!("[{}] Completed recently, skipping sync", domain);
            return Ok(SyncOutcome::Skipped);
        }

        // A completed checkpoint means the previous pass finished; start a
        // new one from the beginning. Anything else resumes where the last
        // committed page left off.
        let starting_over = checkpoint.state == CheckpointState::Completed;
        if starting_over {
            checkpoint.last_page = 0;
            checkpoint.items_synced = 0;
        }
        let full_pass = checkpoint.last_page == 0;

        match self
            .run_inner(adapter, session, &mut checkpoint, full_pass, stop)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                checkpoint.state = CheckpointState::Failed;
                checkpoint.last_failure_at = Some(Utc::now().naive_utc());
                checkpoint.last_error = Some(message.clone());
                if let Err(save_err) = self.checkpoints.save(&checkpoint).await {
                    tracing::error!("[{}] Failed to persist failure state: {}", domain, save_err);
                }
                self.progress.publish(BridgeEvent::SyncFailed {
                    domain,
                    error: message.clone(),
                });
                tracing::error!(
                    "[{}] Sync failed at page {}: {}",
                    domain,
                    checkpoint.last_page + 1,
                    message
                );
                Err(BridgeError::SyncFailed { domain, message })
            }
        }
    }

    fn is_fresh(&self, checkpoint: &Checkpoint) -> bool {
        if checkpoint.state != CheckpointState::Completed {
            return false;
        }
        let Some(last_success) = checkpoint.last_success_at else {
            return false;
        };
        let window = chrono::Duration::from_std(self.freshness_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        Utc::now().naive_utc().signed_duration_since(last_success) < window
    }

    async fn run_inner(
        &self,
        adapter: &dyn SyncDomain,
        session: &BrowserSession,
        checkpoint: &mut Checkpoint,
        full_pass: bool,
        stop: watch::Receiver<bool>,
    ) -> Result<SyncOutcome, BridgeError> {
        let domain = adapter.domain();
        let run_id = Uuid::new_v4();

        let total_pages = adapter.total_pages(session).await?;
        let resume_page = checkpoint.last_page + 1;

        checkpoint.state = CheckpointState::Running;
        checkpoint.total_pages = Some(total_pages);
        self.checkpoints.save(checkpoint).await?;

        tracing::info!(
            "[{}] Sync starting at page {}/{} (run {})",
            domain,
            resume_page,
            total_pages,
            run_id
        );
        self.progress.publish(BridgeEvent::SyncStarted {
            domain,
            resume_page,
            total_pages,
        });

        let mut report = SyncReport {
            domain,
            run_id,
            pages: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            removed: 0,
        };
        let mut seen: HashSet<String> = HashSet::new();

        for page in resume_page..=total_pages {
            // Page boundary: yield to explicit stops and to in-flight orders
            if *stop.borrow() {
                return Ok(self.pause(checkpoint, "stop requested").await);
            }
            if self.priority_lock.is_held() {
                return Ok(self.pause(checkpoint, "order in flight").await);
            }

            self.progress.publish(BridgeEvent::SyncProgress {
                domain,
                phase: SyncPhase::Fetch,
                page,
                total_pages,
                items_processed: checkpoint.items_synced,
            });

            let records = adapter.fetch_page(session, page).await?;

            for record in &records {
                // Write boundary: a stop here leaves the page uncommitted,
                // the checkpoint still points at the previous page
                if *stop.borrow() {
                    return Ok(self.pause(checkpoint, "stop requested").await);
                }

                match self.apply_record(adapter, record, run_id).await? {
                    Applied::Created => report.inserted += 1,
                    Applied::Updated => report.updated += 1,
                    Applied::Unchanged => report.unchanged += 1,
                }
                seen.insert(record.id.clone());
            }

            checkpoint.last_page = page;
            checkpoint.items_synced += records.len() as u64;
            self.checkpoints.save(checkpoint).await?;
            report.pages = page;

            self.progress.publish(BridgeEvent::SyncProgress {
                domain,
                phase: SyncPhase::Apply,
                page,
                total_pages,
                items_processed: checkpoint.items_synced,
            });
        }

        if full_pass {
            self.progress.publish(BridgeEvent::SyncProgress {
                domain,
                phase: SyncPhase::Cleanup,
                page: total_pages,
                total_pages,
                items_processed: checkpoint.items_synced,
            });

            let known = adapter.known_ids().await?;
            let mut missing: Vec<String> = known.difference(&seen).cloned().collect();
            missing.sort();

            if !missing.is_empty() {
                match adapter.missing_policy() {
                    MissingPolicy::Deactivate => {
                        report.removed = adapter.deactivate(&missing).await?;
                        tracing::info!(
                            "[{}] Deactivated {} records absent from source",
                            domain,
                            report.removed
                        );
                    }
                    MissingPolicy::Ignore => {
                        tracing::debug!(
                            "[{}] {} records absent from source, left untouched",
                            domain,
                            missing.len()
                        );
                    }
                }
            }
        } else {
            tracing::info!("[{}] Resumed partial pass, cleanup skipped", domain);
        }

        checkpoint.state = CheckpointState::Completed;
        checkpoint.last_success_at = Some(Utc::now().naive_utc());
        checkpoint.last_error = None;
        self.checkpoints.save(checkpoint).await?;

        tracing::info!(
            "[{}] Sync complete: {} inserted, {} updated, {} unchanged, {} removed",
            domain,
            report.inserted,
            report.updated,
            report.unchanged,
            report.removed
        );
        self.progress.publish(BridgeEvent::SyncCompleted {
            domain,
            inserted: report.inserted,
            updated: report.updated,
            removed: report.removed,
        });

        Ok(SyncOutcome::Completed(report))
    }

    async fn pause(&self, checkpoint: &mut Checkpoint, reason: &str) -> SyncOutcome {
        let domain = checkpoint.domain;
        checkpoint.state = CheckpointState::Idle;
        if let Err(e) = self.checkpoints.save(checkpoint).await {
            tracing::error!("[{}] Failed to persist pause state: {}", domain, e);
        }
        tracing::info!(
            "[{}] Sync paused at page {} ({})",
            domain,
            checkpoint.last_page,
            reason
        );
        self.progress.publish(BridgeEvent::SyncStopped {
            domain,
            last_page: checkpoint.last_page,
        });
        SyncOutcome::Stopped {
            last_page: checkpoint.last_page,
        }
    }

    /// Single-pass change detection: the hash decides whether anything
    /// changed, and the already-loaded stored fields yield the per-field
    /// audit entries.
    async fn apply_record(
        &self,
        adapter: &dyn SyncDomain,
        record: &SourceRecord,
        run_id: Uuid,
    ) -> Result<Applied, BridgeError> {
        let domain = adapter.domain();
        let hash = content_hash(&record.fields);

        match adapter.load_stored(&record.id).await? {
            None => {
                adapter.upsert(record, &hash).await?;
                self.changes
                    .record(vec![ChangeEntry {
                        domain,
                        entity_id: record.id.clone(),
                        change_type: ChangeType::Created,
                        field_name: None,
                        old_value: None,
                        new_value: None,
                        sync_run_id: run_id,
                    }])
                    .await?;
                Ok(Applied::Created)
            }
            Some(stored) if stored.content_hash != hash => {
                adapter.upsert(record, &hash).await?;

                let mut entries = Vec::new();
                for (name, new_value) in &record.fields {
                    let old_value = stored
                        .fields
                        .iter()
                        .find(|(stored_name, _)| stored_name == name)
                        .and_then(|(_, value)| value.clone());
                    if old_value != *new_value {
                        entries.push(ChangeEntry {
                            domain,
                            entity_id: record.id.clone(),
                            change_type: ChangeType::FieldChanged,
                            field_name: Some((*name).to_string()),
                            old_value,
                            new_value: new_value.clone(),
                            sync_run_id: run_id,
                        });
                    }
                }
                // Hash moved but no field compared differently (e.g. a field
                // was added to the schema): keep a record-level entry
                if entries.is_empty() {
                    entries.push(ChangeEntry {
                        domain,
                        entity_id: record.id.clone(),
                        change_type: ChangeType::Updated,
                        field_name: None,
                        old_value: None,
                        new_value: None,
                        sync_run_id: run_id,
                    });
                }
                self.changes.record(entries).await?;
                Ok(Applied::Updated)
            }
            Some(_) => Ok(Applied::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::clamp_resume_point;
    use chrono::Utc;
    use std::collections::HashMap;

    fn dummy_session() -> BrowserSession {
        BrowserSession {
            user_id: "sync-service".into(),
            process_index: 0,
            context_id: "ctx".into(),
            target_id: "target".into(),
            ws_url: "ws://mock".into(),
            created_at: Utc::now(),
        }
    }

    struct MemCheckpoints {
        map: parking_lot::Mutex<HashMap<Domain, Checkpoint>>,
    }

    impl MemCheckpoints {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                map: parking_lot::Mutex::new(HashMap::new()),
            })
        }

        fn get_sync(&self, domain: Domain) -> Checkpoint {
            self.map
                .lock()
                .get(&domain)
                .cloned()
                .unwrap_or_else(|| Checkpoint::fresh(domain))
        }
    }

    #[async_trait]
    impl CheckpointStore for MemCheckpoints {
        async fn get(&self, domain: Domain) -> Result<Checkpoint, BridgeError> {
            Ok(self.get_sync(domain))
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

    struct MemChangeLog {
        entries: parking_lot::Mutex<Vec<ChangeEntry>>,
    }

    impl MemChangeLog {
        fn new() -> Arc<Self> {
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

    fn record(id: &str, name: &str, city: &str) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            fields: vec![
                ("name", Some(name.to_string())),
                ("city", Some(city.to_string())),
            ],
        }
    }

    struct MockDomain {
        pages: parking_lot::Mutex<Vec<Vec<SourceRecord>>>,
        stored: parking_lot::Mutex<HashMap<String, StoredRecord>>,
        fetched_pages: parking_lot::Mutex<Vec<u32>>,
        fail_on_page: parking_lot::Mutex<Option<u32>>,
        stop_on_page: parking_lot::Mutex<Option<(u32, watch::Sender<bool>)>>,
        deactivated: parking_lot::Mutex<Vec<String>>,
        policy: MissingPolicy,
    }

    impl MockDomain {
        fn new(pages: Vec<Vec<SourceRecord>>) -> Arc<Self> {
            Arc::new(Self {
                pages: parking_lot::Mutex::new(pages),
                stored: parking_lot::Mutex::new(HashMap::new()),
                fetched_pages: parking_lot::Mutex::new(Vec::new()),
                fail_on_page: parking_lot::Mutex::new(None),
                stop_on_page: parking_lot::Mutex::new(None),
                deactivated: parking_lot::Mutex::new(Vec::new()),
                policy: MissingPolicy::Deactivate,
            })
        }
    }

    #[async_trait]
    impl SyncDomain for MockDomain {
        fn domain(&self) -> Domain {
            Domain::Customers
        }

        fn missing_policy(&self) -> MissingPolicy {
            self.policy
        }

        async fn total_pages(&self, _session: &BrowserSession) -> Result<u32, BridgeError> {
            Ok(self.pages.lock().len() as u32)
        }

        async fn fetch_page(
            &self,
            _session: &BrowserSession,
            page: u32,
        ) -> Result<Vec<SourceRecord>, BridgeError> {
            if *self.fail_on_page.lock() == Some(page) {
                return Err(BridgeError::Driver("grid went away".into()));
            }
            if let Some((stop_page, tx)) = self.stop_on_page.lock().as_ref() {
                if *stop_page == page {
                    let _ = tx.send(true);
                }
            }
            self.fetched_pages.lock().push(page);
            Ok(self.pages.lock()[(page - 1) as usize].clone())
        }

        async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
            Ok(self.stored.lock().get(id).cloned())
        }

        async fn upsert(
            &self,
            record: &SourceRecord,
            content_hash: &str,
        ) -> Result<(), BridgeError> {
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

        async fn deactivate(&self, ids: &[String]) -> Result<u64, BridgeError> {
            self.deactivated.lock().extend(ids.iter().cloned());
            Ok(ids.len() as u64)
        }
    }

    fn engine(
        checkpoints: &Arc<MemCheckpoints>,
        changes: &Arc<MemChangeLog>,
        lock: &Arc<PriorityLock>,
        freshness: Duration,
    ) -> Arc<DeltaSyncEngine> {
        DeltaSyncEngine::new(
            Arc::clone(checkpoints) as Arc<dyn CheckpointStore>,
            Arc::clone(changes) as Arc<dyn ChangeLog>,
            ProgressBroadcaster::new(),
            Arc::clone(lock),
            freshness,
        )
    }

    fn no_stop() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn first_run_inserts_everything() {
        let pages = vec![
            vec![record("1", "Rossi", "Milano"), record("2", "Bianchi", "Roma")],
            vec![record("3", "Verdi", "Napoli")],
        ];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.inserted, 3);
        assert_eq!(report.updated, 0);

        let checkpoint = checkpoints.get_sync(Domain::Customers);
        assert_eq!(checkpoint.state, CheckpointState::Completed);
        assert_eq!(checkpoint.last_page, 2);
        assert_eq!(checkpoint.items_synced, 3);
        assert_eq!(changes.entries.lock().len(), 3);
        assert!(
            changes
                .entries
                .lock()
                .iter()
                .all(|e| e.change_type == ChangeType::Created)
        );
    }

    #[tokio::test]
    async fn resync_without_changes_writes_nothing() {
        let pages = vec![vec![record("1", "Rossi", "Milano")]];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();
        let after_first = changes.entries.lock().len();
        let count_first = checkpoints.get_sync(Domain::Customers).items_synced;

        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.unchanged, 1);
        assert_eq!(changes.entries.lock().len(), after_first);
        assert_eq!(
            checkpoints.get_sync(Domain::Customers).items_synced,
            count_first
        );
    }

    #[tokio::test]
    async fn fresh_completion_skips_the_run() {
        let pages = vec![vec![record("1", "Rossi", "Milano")]];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::from_secs(3600));
        let domain = MockDomain::new(pages);

        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();
        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        assert!(matches!(outcome, SyncOutcome::Skipped));
        assert_eq!(domain.fetched_pages.lock().len(), 1);
    }

    #[tokio::test]
    async fn failure_preserves_last_committed_page_and_resumes_there() {
        let pages = vec![
            vec![record("1", "Rossi", "Milano")],
            vec![record("2", "Bianchi", "Roma")],
            vec![record("3", "Verdi", "Napoli")],
        ];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);
        *domain.fail_on_page.lock() = Some(2);

        let err = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::SyncFailed { .. }));

        let checkpoint = checkpoints.get_sync(Domain::Customers);
        assert_eq!(checkpoint.state, CheckpointState::Failed);
        assert_eq!(checkpoint.last_page, 1, "page 1 committed, page 2 was not");
        assert!(checkpoint.last_error.is_some());

        // Next run resumes at page 2, never re-fetching page 1
        *domain.fail_on_page.lock() = None;
        domain.fetched_pages.lock().clear();
        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();
        assert_eq!(*domain.fetched_pages.lock(), vec![2, 3]);
        assert_eq!(
            checkpoints.get_sync(Domain::Customers).state,
            CheckpointState::Completed
        );
    }

    #[tokio::test]
    async fn stop_request_pauses_without_failing() {
        let pages = vec![
            vec![record("1", "Rossi", "Milano")],
            vec![record("2", "Bianchi", "Roma")],
            vec![record("3", "Verdi", "Napoli")],
        ];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        let (tx, rx) = watch::channel(false);
        *domain.stop_on_page.lock() = Some((2, tx));

        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), rx)
            .await
            .unwrap();

        // Stop was raised during page 2's fetch, so page 2 is not committed
        let SyncOutcome::Stopped { last_page } = outcome else {
            panic!("expected pause");
        };
        assert_eq!(last_page, 1);

        let checkpoint = checkpoints.get_sync(Domain::Customers);
        assert_eq!(checkpoint.state, CheckpointState::Idle);
        assert!(checkpoint.last_error.is_none());

        // Resume covers only the remaining pages
        domain.fetched_pages.lock().clear();
        *domain.stop_on_page.lock() = None;
        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();
        assert_eq!(*domain.fetched_pages.lock(), vec![2, 3]);
    }

    #[tokio::test]
    async fn priority_lock_blocks_new_page_cycles() {
        let pages = vec![vec![record("1", "Rossi", "Milano")]];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        let guard = lock.raise().unwrap();
        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();
        drop(guard);

        assert!(matches!(outcome, SyncOutcome::Stopped { last_page: 0 }));
        assert!(domain.fetched_pages.lock().is_empty());
    }

    #[tokio::test]
    async fn changed_field_yields_one_audit_entry_per_field() {
        let pages = vec![vec![record("1", "Rossi", "Milano")]];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        // Same record, one field changed upstream
        *domain.pages.lock() = vec![vec![record("1", "Rossi", "Torino")]];
        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        let entries = changes.entries.lock();
        let field_changes: Vec<_> = entries
            .iter()
            .filter(|e| e.change_type == ChangeType::FieldChanged)
            .collect();
        assert_eq!(field_changes.len(), 1);
        let change = field_changes[0];
        assert_eq!(change.field_name.as_deref(), Some("city"));
        assert_eq!(change.old_value.as_deref(), Some("Milano"));
        assert_eq!(change.new_value.as_deref(), Some("Torino"));
    }

    #[tokio::test]
    async fn cleanup_deactivates_ids_missing_from_source() {
        let pages = vec![vec![record("1", "Rossi", "Milano"), record("2", "Bianchi", "Roma")]];
        let (checkpoints, changes, lock) = (MemCheckpoints::new(), MemChangeLog::new(), PriorityLock::new());
        let engine = engine(&checkpoints, &changes, &lock, Duration::ZERO);
        let domain = MockDomain::new(pages);

        engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        *domain.pages.lock() = vec![vec![record("1", "Rossi", "Milano")]];
        let outcome = engine
            .run(domain.as_ref(), &dummy_session(), no_stop())
            .await
            .unwrap();

        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.removed, 1);
        assert_eq!(*domain.deactivated.lock(), vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn resume_point_never_regresses_without_reset() {
        let checkpoints = MemCheckpoints::new();
        let mut checkpoint = Checkpoint::fresh(Domain::Products);
        checkpoint.state = CheckpointState::Failed;
        checkpoint.last_page = 5;
        checkpoints.save(&checkpoint).await.unwrap();

        // A buggy smaller save is clamped up
        checkpoint.last_page = 3;
        checkpoints.save(&checkpoint).await.unwrap();
        assert_eq!(checkpoints.get_sync(Domain::Products).last_page, 5);

        // Forced reset is the only way down
        checkpoints.reset(Domain::Products).await.unwrap();
        assert_eq!(checkpoints.get_sync(Domain::Products).last_page, 0);
    }
}
