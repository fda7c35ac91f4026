//! Lease renewal
//!
//! Every lock acquired from the store is handed to a [`RenewalScheduler`],
//! which extends the key's TTL at half-life until the holder releases it.
//!
//! Two background tasks cooperate:
//!
//! - the enqueuer moves submissions from a bounded channel into the
//!   [`RenewalQueue`] and wakes the worker
//! - the worker drains the queue oldest-first and, one lease at a time, waits
//!   for the lease's renewal instant (or its cancellation), renews it, and
//!   resubmits it
//!
//! A renewal that fails is not retried: the lease lapses and the key expires
//! on its own.

use leasehold_store::{HealthMonitor, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::LockConfig;
use crate::queue::RenewalQueue;

/// A renewable lease on one store key.
///
/// Shared between the lock holder (through its `LockEntry`) and the renewal
/// worker. Cancelling sets the done flag and fires the lease's own wait, so
/// the worker drops it without sleeping out the remaining delay.
#[derive(Debug)]
pub struct Lease {
    key: String,
    renew_at: Mutex<Instant>,
    done: AtomicBool,
    wake: Notify,
}

impl Lease {
    pub(crate) fn new(key: impl Into<String>, renew_at: Instant) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            renew_at: Mutex::new(renew_at),
            done: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }

    /// Key held by this lease
    pub fn key(&self) -> &str {
        &self.key
    }

    /// When the next renewal is due
    pub fn renew_at(&self) -> Instant {
        *self.renew_at.lock()
    }

    /// Whether the lease has been released
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Mark released and wake the worker if it is waiting on this lease.
    pub fn cancel(&self) {
        self.done.store(true, Ordering::Release);
        // Stores a permit when nobody waits yet, so a later wait returns at once
        self.wake.notify_one();
    }

    fn set_renew_at(&self, at: Instant) {
        *self.renew_at.lock() = at;
    }

    async fn wait(&self) {
        if self.is_done() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(self.renew_at()) => {}
            _ = self.wake.notified() => {}
        }
    }
}

/// Background engine that keeps store leases alive.
///
/// Both tasks are aborted when the scheduler is dropped.
pub struct RenewalScheduler {
    submit: mpsc::Sender<Arc<Lease>>,
    queue: Arc<RenewalQueue<Arc<Lease>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RenewalScheduler {
    /// Start the enqueuer and renewal tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(health: HealthMonitor, config: &LockConfig) -> Self {
        let (submit, submissions) = mpsc::channel(config.submit_capacity.max(1));
        let queue = Arc::new(RenewalQueue::new(config.ring_capacity));
        let wake = Arc::new(Notify::new());

        let enqueuer = tokio::spawn(enqueue_loop(submissions, queue.clone(), wake.clone()));

        let worker = Worker {
            queue: queue.clone(),
            wake,
            resubmit: submit.clone(),
            health,
            ttl: config.ttl,
            renew_after: config.renew_after(),
            op_timeout: config.op_timeout,
        };
        let worker = tokio::spawn(worker.run());

        Self {
            submit,
            queue,
            tasks: vec![enqueuer, worker],
        }
    }

    /// Hand a freshly acquired lease to the scheduler.
    ///
    /// Waits only when the submission channel is full.
    pub async fn submit(&self, lease: Arc<Lease>) {
        if self.submit.send(lease).await.is_err() {
            warn!("Renewal scheduler stopped, lease will not be renewed");
        }
    }

    /// Leases waiting in the queue (not counting the one being waited on)
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn enqueue_loop(
    mut submissions: mpsc::Receiver<Arc<Lease>>,
    queue: Arc<RenewalQueue<Arc<Lease>>>,
    wake: Arc<Notify>,
) {
    while let Some(lease) = submissions.recv().await {
        queue.push(lease);
        wake.notify_one();
    }
}

struct Worker {
    queue: Arc<RenewalQueue<Arc<Lease>>>,
    wake: Arc<Notify>,
    resubmit: mpsc::Sender<Arc<Lease>>,
    health: HealthMonitor,
    ttl: Duration,
    renew_after: Duration,
    op_timeout: Duration,
}

impl Worker {
    async fn run(self) {
        loop {
            let batch = self.queue.drain();
            if batch.is_empty() {
                self.wake.notified().await;
                continue;
            }

            trace!(count = batch.len(), "Draining renewal queue");
            for lease in batch {
                self.renew(lease).await;
            }
        }
    }

    async fn renew(&self, lease: Arc<Lease>) {
        lease.wait().await;

        if lease.is_done() {
            trace!(key = %lease.key(), "Lease released, dropping");
            return;
        }

        let store = self.health.store();
        match bounded(self.op_timeout, store.expire(lease.key(), self.ttl)).await {
            Ok(true) => {
                lease.set_renew_at(Instant::now() + self.renew_after);
                debug!(key = %lease.key(), "Renewed lease");
                if self.resubmit.send(lease).await.is_err() {
                    warn!("Renewal scheduler stopped while resubmitting lease");
                }
            }
            Ok(false) => {
                warn!(key = %lease.key(), "Lease lapsed: key no longer exists");
            }
            Err(e) => {
                self.health.occur_err(&e);
                warn!(key = %lease.key(), error = %e, "Lease lapsed: renewal failed");
            }
        }
    }
}
