//! End-to-end tests of the arbitration core: orchestrator mutual exclusion,
//! queue priorities, the fast path, and the order queue's priority lock,
//! all wired against the in-memory doubles from `common`.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use archibald_bridge::models::domain::Domain;
use archibald_bridge::services::storage::{CheckpointState, JobStatus};

use crate::common::{
    build_harness, payload, test_order_config, test_sync_config, wait_until,
};

fn completed(harness: &common::Harness, domain: Domain) -> bool {
    harness.checkpoints.snapshot(domain).state == CheckpointState::Completed
}

#[tokio::test]
async fn only_one_domain_ever_runs_at_a_time() {
    let h = build_harness(
        3,
        Duration::from_millis(10),
        test_sync_config(),
        test_order_config(),
    )
    .await;

    for domain in Domain::ALL {
        h.orchestrator.request_sync(domain, None, None);
    }

    assert!(
        wait_until(
            || Domain::ALL.iter().all(|d| completed(&h, *d)),
            Duration::from_secs(10)
        )
        .await,
        "all six domains drain"
    );

    assert_eq!(
        h.max_pages_active.load(Ordering::SeqCst),
        1,
        "two domains fetched pages concurrently"
    );
}

#[tokio::test]
async fn queued_request_runs_after_current_completes() {
    let h = build_harness(
        2,
        Duration::from_millis(5),
        test_sync_config(),
        test_order_config(),
    )
    .await;

    // Hold customers open on its first page
    h.controls[&Domain::Customers].close_gate();
    h.orchestrator.request_sync(Domain::Customers, None, None);
    assert!(
        wait_until(
            || h.orchestrator.running_domain() == Some(Domain::Customers),
            Duration::from_secs(2)
        )
        .await
    );

    h.orchestrator.request_sync(Domain::Prices, None, None);

    let status = h.orchestrator.status();
    assert_eq!(
        status.current.as_ref().map(|c| c.domain),
        Some(Domain::Customers)
    );
    assert_eq!(status.queue.len(), 1);
    assert_eq!(status.queue[0].domain, Domain::Prices);

    h.controls[&Domain::Customers].open_gate();

    assert!(
        wait_until(
            || completed(&h, Domain::Customers) && completed(&h, Domain::Prices),
            Duration::from_secs(5)
        )
        .await
    );

    let status = h.orchestrator.status();
    assert!(status.current.is_none());
    assert!(status.queue.is_empty());
    assert_eq!(
        *h.run_order.lock(),
        vec![Domain::Customers, Domain::Prices]
    );
}

#[tokio::test]
async fn repeat_request_raises_priority_without_duplicating() {
    let h = build_harness(
        1,
        Duration::from_millis(5),
        test_sync_config(),
        test_order_config(),
    )
    .await;

    h.controls[&Domain::Customers].close_gate();
    h.orchestrator.request_sync(Domain::Customers, None, None);
    assert!(
        wait_until(
            || h.orchestrator.running_domain() == Some(Domain::Customers),
            Duration::from_secs(2)
        )
        .await
    );

    h.orchestrator.request_sync(Domain::Prices, None, None);
    h.orchestrator.request_sync(Domain::Prices, Some(99), None);

    let status = h.orchestrator.status();
    assert_eq!(status.queue.len(), 1);
    assert_eq!(status.queue[0].domain, Domain::Prices);
    assert_eq!(status.queue[0].priority, 99);

    h.controls[&Domain::Customers].open_gate();
    assert!(wait_until(|| completed(&h, Domain::Prices), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn higher_priority_domains_drain_first() {
    let h = build_harness(
        1,
        Duration::from_millis(5),
        test_sync_config(),
        test_order_config(),
    )
    .await;

    // Occupy the slot so the next three requests all queue up
    h.controls[&Domain::Orders].close_gate();
    h.orchestrator.request_sync(Domain::Orders, None, None);
    assert!(
        wait_until(
            || h.orchestrator.running_domain() == Some(Domain::Orders),
            Duration::from_secs(2)
        )
        .await
    );

    h.orchestrator.request_sync(Domain::Prices, None, None); // 10
    h.orchestrator.request_sync(Domain::Invoices, None, None); // 30
    h.orchestrator.request_sync(Domain::Customers, None, None); // 50

    h.controls[&Domain::Orders].open_gate();

    assert!(
        wait_until(
            || [Domain::Prices, Domain::Invoices, Domain::Customers]
                .iter()
                .all(|d| completed(&h, *d)),
            Duration::from_secs(5)
        )
        .await
    );

    assert_eq!(
        *h.run_order.lock(),
        vec![
            Domain::Orders,
            Domain::Customers,
            Domain::Invoices,
            Domain::Prices
        ]
    );
}

#[tokio::test]
async fn fast_path_is_reference_counted_and_blocks_the_queue() {
    let h = build_harness(
        1,
        Duration::ZERO,
        test_sync_config(),
        test_order_config(),
    )
    .await;

    assert_eq!(h.orchestrator.smart_fast_path(Domain::Customers).unwrap(), 1);
    assert_eq!(h.orchestrator.smart_fast_path(Domain::Customers).unwrap(), 2);

    // The fast path's own domain runs promptly
    assert!(wait_until(|| completed(&h, Domain::Customers), Duration::from_secs(2)).await);

    // Other domains stay queued while the fast path is active
    h.orchestrator.request_sync(Domain::Products, None, None);
    h.orchestrator.request_sync(Domain::Prices, None, None);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!completed(&h, Domain::Products));
    assert!(!completed(&h, Domain::Prices));
    assert_eq!(h.orchestrator.status().queue.len(), 2);

    // One exit is not enough (refcount 2 -> 1)
    assert_eq!(h.orchestrator.end_fast_path(), 1);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!completed(&h, Domain::Products));

    // The second exit drains the queued domains in priority order
    assert_eq!(h.orchestrator.end_fast_path(), 0);
    assert!(
        wait_until(
            || completed(&h, Domain::Products) && completed(&h, Domain::Prices),
            Duration::from_secs(5)
        )
        .await
    );

    let order = h.run_order.lock().clone();
    let products_at = order.iter().position(|d| *d == Domain::Products).unwrap();
    let prices_at = order.iter().position(|d| *d == Domain::Prices).unwrap();
    assert!(products_at < prices_at, "priority 20 before priority 10");
}

#[tokio::test]
async fn leaked_fast_path_is_force_ended_by_the_safety_timeout() {
    let mut sync_config = test_sync_config();
    sync_config.fast_path_timeout = Duration::from_millis(200);

    let h = build_harness(1, Duration::ZERO, sync_config, test_order_config()).await;

    h.orchestrator.smart_fast_path(Domain::Customers).unwrap();
    h.orchestrator.request_sync(Domain::Products, None, None);

    // Never exited; the safety timeout must resume the queue on its own
    assert!(
        wait_until(|| completed(&h, Domain::Products), Duration::from_secs(5)).await,
        "queue resumes after the leaked fast path expires"
    );
    assert!(h.orchestrator.status().fast_path.is_none());
}

#[tokio::test]
async fn order_makes_running_sync_yield_and_resume() {
    let h = build_harness(
        5,
        Duration::from_millis(50),
        test_sync_config(),
        test_order_config(),
    )
    .await;

    h.orchestrator.request_sync(Domain::Customers, None, None);
    assert!(
        wait_until(
            || h.orchestrator.running_domain() == Some(Domain::Customers),
            Duration::from_secs(2)
        )
        .await
    );

    let job_id = h.queue.enqueue("ada".into(), payload("1002241")).await.unwrap();

    assert!(
        wait_until(
            || {
                h.jobs
                    .get_sync(job_id)
                    .is_some_and(|j| j.status == JobStatus::Completed)
            },
            Duration::from_secs(5)
        )
        .await,
        "order completes while sync yields"
    );

    // The order never overlapped a page fetch
    assert!(!h.driver.overlap_detected.load(Ordering::SeqCst));
    assert_eq!(h.driver.orders_placed.lock().len(), 1);

    // The yielded sync resumes afterwards and finishes all five pages
    assert!(wait_until(|| completed(&h, Domain::Customers), Duration::from_secs(10)).await);
    assert_eq!(h.checkpoints.snapshot(Domain::Customers).last_page, 5);
}

#[tokio::test]
async fn order_times_out_when_sync_never_yields() {
    let mut order_config = test_order_config();
    order_config.lock_wait_interval = Duration::from_millis(20);
    order_config.lock_max_attempts = 3;

    let h = build_harness(
        2,
        Duration::ZERO,
        test_sync_config(),
        order_config,
    )
    .await;

    // A page fetch stuck inside the ERP: the run never reaches a boundary
    h.controls[&Domain::Customers].close_gate();
    h.orchestrator.request_sync(Domain::Customers, None, None);
    assert!(
        wait_until(
            || h.orchestrator.running_domain() == Some(Domain::Customers),
            Duration::from_secs(2)
        )
        .await
    );

    let job_id = h.queue.enqueue("ada".into(), payload("1002241")).await.unwrap();

    assert!(
        wait_until(
            || {
                h.jobs
                    .get_sync(job_id)
                    .is_some_and(|j| j.status == JobStatus::Failed)
            },
            Duration::from_secs(5)
        )
        .await
    );
    let job = h.jobs.get_sync(job_id).unwrap();
    assert!(
        job.error.as_deref().unwrap_or("").contains("exclusive"),
        "failure reason is the lock timeout, got {:?}",
        job.error
    );
    assert!(h.driver.orders_placed.lock().is_empty());

    // Unblock and let the sync finish
    h.controls[&Domain::Customers].open_gate();
    assert!(wait_until(|| completed(&h, Domain::Customers), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn failed_order_is_only_retried_as_a_new_job() {
    let h = build_harness(
        1,
        Duration::ZERO,
        test_sync_config(),
        test_order_config(),
    )
    .await;

    h.driver.fail_orders.store(true, Ordering::SeqCst);
    let job_id = h.queue.enqueue("ada".into(), payload("1002241")).await.unwrap();

    assert!(
        wait_until(
            || {
                h.jobs
                    .get_sync(job_id)
                    .is_some_and(|j| j.status == JobStatus::Failed)
            },
            Duration::from_secs(5)
        )
        .await
    );
    // Exactly one attempt: no automatic retry
    assert_eq!(h.jobs.get_sync(job_id).unwrap().attempts, 1);

    // Manual retry produces a brand-new job carrying the same payload
    h.driver.fail_orders.store(false, Ordering::SeqCst);
    let retry_id = h.queue.retry(job_id).await.unwrap();
    assert_ne!(retry_id, job_id);

    assert!(
        wait_until(
            || {
                h.jobs
                    .get_sync(retry_id)
                    .is_some_and(|j| j.status == JobStatus::Completed)
            },
            Duration::from_secs(5)
        )
        .await
    );
    let retried = h.jobs.get_sync(retry_id).unwrap();
    assert_eq!(retried.retry_of, Some(job_id));
    assert_eq!(retried.payload.customer_account, "1002241");

    // A completed job cannot be retried
    assert!(h.queue.retry(retry_id).await.is_err());
}
