//! Progress event broadcasting
//!
//! Every component publishes structured progress events here; subscribers can
//! be the WebSocket handler, a log sink or a test harness. Sends are
//! fire-and-forget and never block the publisher.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::domain::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Fetch,
    Apply,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    SyncStarted {
        domain: Domain,
        resume_page: u32,
        total_pages: u32,
    },
    SyncProgress {
        domain: Domain,
        phase: SyncPhase,
        page: u32,
        total_pages: u32,
        items_processed: u64,
    },
    SyncCompleted {
        domain: Domain,
        inserted: u64,
        updated: u64,
        removed: u64,
    },
    SyncStopped {
        domain: Domain,
        last_page: u32,
    },
    SyncFailed {
        domain: Domain,
        error: String,
    },
    OrderStarted {
        job_id: Uuid,
    },
    OrderCompleted {
        job_id: Uuid,
        erp_order_id: String,
    },
    OrderFailed {
        job_id: Uuid,
        error: String,
    },
}

#[derive(Clone)]
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<BridgeEvent>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self { tx }
    }

    /// Publish an event; errors (no subscribers) are ignored.
    pub fn publish(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
