//! Order-in-flight priority lock
//!
//! A single shared flag arbitrating between order placement and background
//! sync: while the lock is held, the orchestrator starts no new domain run
//! and the sync engine starts no new page cycle. Release is owner-scoped
//! through an RAII guard, so it cannot be forgotten on an error path, and
//! waiters are woken through a `Notify` instead of busy polling.

use std::pin::pin;
use std::sync::Arc;

use tokio::sync::Notify;

pub struct PriorityLock {
    held: parking_lot::Mutex<bool>,
    released: Notify,
    /// Extra wake-up target raised on release (the orchestrator's drain loop)
    on_release: parking_lot::Mutex<Option<Arc<Notify>>>,
}

impl PriorityLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            held: parking_lot::Mutex::new(false),
            released: Notify::new(),
            on_release: parking_lot::Mutex::new(None),
        })
    }

    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }

    /// Register a notifier to poke whenever the lock is released.
    pub fn notify_on_release(&self, notify: Arc<Notify>) {
        *self.on_release.lock() = Some(notify);
    }

    /// Raise the flag. Returns `None` if it is already held by someone else.
    pub fn raise(&self) -> Option<PriorityLockGuard<'_>> {
        let mut held = self.held.lock();
        if *held {
            return None;
        }
        *held = true;
        Some(PriorityLockGuard { lock: self })
    }

    /// Wait until the lock is not held. Returns immediately when it is free.
    pub async fn wait_released(&self) {
        loop {
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();
            if !self.is_held() {
                return;
            }
            notified.await;
        }
    }
}

pub struct PriorityLockGuard<'a> {
    lock: &'a PriorityLock,
}

impl Drop for PriorityLockGuard<'_> {
    fn drop(&mut self) {
        *self.lock.held.lock() = false;
        self.lock.released.notify_waiters();
        if let Some(notify) = self.lock.on_release.lock().as_ref() {
            notify.notify_one();
        }
    }
}
