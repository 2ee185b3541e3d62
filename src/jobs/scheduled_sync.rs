//! Scheduled sync triggers
//!
//! One interval loop per domain, each just asking the orchestrator for a
//! sync. The orchestrator arbitrates who actually runs, and the engine's
//! freshness window keeps restarts from re-scraping everything.

use std::sync::Arc;

use tokio::time::interval;

use crate::config::SyncConfig;
use crate::models::domain::Domain;
use crate::services::orchestrator::SyncOrchestrator;

pub fn start_scheduled_sync_jobs(orchestrator: Arc<SyncOrchestrator>, config: &SyncConfig) {
    for domain in Domain::ALL {
        let orchestrator = Arc::clone(&orchestrator);
        let period = config.interval_for(domain);

        tokio::spawn(async move {
            let mut interval = interval(period);

            // The first tick fires immediately: run on startup, the freshness
            // window decides whether anything actually happens
            loop {
                interval.tick().await;
                tracing::info!("[{}] Scheduled sync trigger", domain);
                orchestrator.request_sync(domain, None, None);
            }
        });
    }
}
