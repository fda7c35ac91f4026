//! Store health monitoring.
//!
//! Callers consult [`HealthMonitor::is_ok`] before every store round-trip and
//! report failures through [`HealthMonitor::occur_err`]. The first failure
//! after a healthy period launches a single background prober that pings the
//! store until it answers again; further failures while the prober runs only
//! update the recorded error.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::{CoordinationStore, HealthConfig, StoreError, bounded};

/// Shared health state of one coordination store.
///
/// Cloning is cheap; clones observe the same state.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CoordinationStore>,
    config: HealthConfig,
    // Lock-free view of the flag; only written while `state` is held
    ok: AtomicBool,
    state: Mutex<State>,
    probes_started: AtomicU64,
}

#[derive(Default)]
struct State {
    last_error: Option<StoreError>,
    // Bumped on every reported failure
    failures: u64,
    probing: bool,
}

impl HealthMonitor {
    /// Create a monitor for `store`, initially healthy.
    pub fn new(store: Arc<dyn CoordinationStore>, config: HealthConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                ok: AtomicBool::new(true),
                state: Mutex::new(State::default()),
                probes_started: AtomicU64::new(0),
            }),
        }
    }

    /// The monitored store.
    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.inner.store
    }

    /// Whether the store is currently considered reachable.
    pub fn is_ok(&self) -> bool {
        self.inner.ok.load(Ordering::Acquire)
    }

    /// Last recorded failure, cleared when the store recovers.
    pub fn error(&self) -> Option<StoreError> {
        self.inner.state.lock().last_error.clone()
    }

    /// Error to hand to callers that fail fast while the store is down.
    pub fn unavailable(&self) -> StoreError {
        self.error()
            .unwrap_or_else(|| StoreError::unavailable("coordination store is unhealthy"))
    }

    /// Number of recovery probers launched so far.
    pub fn probes_started(&self) -> u64 {
        self.inner.probes_started.load(Ordering::Acquire)
    }

    /// Whether a recovery prober is currently running.
    pub fn is_probing(&self) -> bool {
        self.inner.state.lock().probing
    }

    /// Record a store failure and mark the store unhealthy.
    ///
    /// The prober is spawned on the current tokio runtime. Outside a runtime
    /// the failure is still recorded, but the store stays unhealthy until a
    /// later `occur_err` made from inside a runtime starts the prober.
    pub fn occur_err(&self, err: &StoreError) {
        let runtime = tokio::runtime::Handle::try_current().ok();

        let (was_ok, start) = {
            let mut state = self.inner.state.lock();
            state.last_error = Some(err.clone());
            state.failures = state.failures.wrapping_add(1);
            let was_ok = self.inner.ok.swap(false, Ordering::AcqRel);

            let start = !state.probing && runtime.is_some();
            if start {
                state.probing = true;
            }
            (was_ok, start)
        };

        if was_ok {
            warn!(error = %err, store = self.inner.store.store_type(), "Coordination store marked unhealthy");
        }

        let Some(runtime) = runtime else {
            warn!("No tokio runtime available, store recovery not started");
            return;
        };
        if !start {
            return;
        }

        self.inner.probes_started.fetch_add(1, Ordering::AcqRel);
        let prober = Prober {
            inner: Arc::downgrade(&self.inner),
            finished: false,
        };
        runtime.spawn(prober.run());
    }
}

/// Background recovery loop.
///
/// Dropping an unfinished prober (runtime shutdown) hands the slot back so
/// the next reported failure can start a fresh one.
struct Prober {
    inner: Weak<Inner>,
    finished: bool,
}

impl Prober {
    async fn run(mut self) {
        let interval = match self.inner.upgrade() {
            Some(inner) => inner.config.probe_interval,
            None => return,
        };

        loop {
            tokio::time::sleep(interval).await;

            // Monitor dropped: nobody is left to care about recovery
            let Some(inner) = self.inner.upgrade() else {
                return;
            };

            let seen = inner.state.lock().failures;
            match bounded(inner.config.probe_timeout, inner.store.ping()).await {
                Ok(()) => {
                    if self.restore(&inner, seen) {
                        info!(store = inner.store.store_type(), "Coordination store recovered");
                        return;
                    }
                    debug!("Store failure reported during recovery check, checking again");
                }
                Err(e) => {
                    debug!(error = %e, "Store recovery check failed");
                }
            }
        }
    }

    /// Mark the store healthy unless a failure arrived after `seen`.
    fn restore(&mut self, inner: &Inner, seen: u64) -> bool {
        let mut state = inner.state.lock();
        if state.failures != seen {
            return false;
        }
        state.last_error = None;
        state.probing = false;
        inner.ok.store(true, Ordering::Release);
        self.finished = true;
        true
    }
}

impl Drop for Prober {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.state.lock().probing = false;
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("ok", &self.is_ok())
            .field("last_error", &self.error())
            .field("probing", &self.is_probing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use std::time::Duration;

    fn monitor() -> (Arc<FlakyStore>, HealthMonitor) {
        let store = Arc::new(FlakyStore::memory());
        let monitor = HealthMonitor::new(store.clone(), HealthConfig::default());
        (store, monitor)
    }

    #[tokio::test]
    async fn test_starts_healthy() {
        let (_, monitor) = monitor();
        assert!(monitor.is_ok());
        assert!(monitor.error().is_none());
        assert!(!monitor.is_probing());
        assert_eq!(monitor.probes_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_burst_starts_single_prober() {
        let (store, monitor) = monitor();
        store.fail();

        for i in 0..100 {
            monitor.occur_err(&StoreError::unavailable(format!("failure {}", i)));
        }

        assert!(!monitor.is_ok());
        assert!(monitor.is_probing());
        assert_eq!(monitor.probes_started(), 1);
        assert_eq!(monitor.error(), Some(StoreError::unavailable("failure 99")));

        // Probes keep failing while the outage lasts
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!monitor.is_ok());
        assert!(store.ping_count() >= 9);
        assert_eq!(monitor.probes_started(), 1);

        store.recover();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(monitor.is_ok());
        assert!(monitor.error().is_none());
        assert!(!monitor.is_probing());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reporters_start_single_prober() {
        let (store, monitor) = monitor();
        store.fail();

        let handles: Vec<_> = (0..128)
            .map(|_| {
                let monitor = monitor.clone();
                tokio::spawn(async move {
                    monitor.occur_err(&StoreError::Timeout);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!monitor.is_ok());
        assert_eq!(monitor.probes_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_outage_after_recovery_starts_new_prober() {
        let (store, monitor) = monitor();

        monitor.occur_err(&StoreError::Timeout);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(monitor.is_ok());

        store.fail();
        monitor.occur_err(&StoreError::Timeout);
        assert!(!monitor.is_ok());
        assert_eq!(monitor.probes_started(), 2);
        assert_eq!(monitor.unavailable(), StoreError::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_during_recovery_check_is_kept() {
        let (store, monitor) = monitor();

        let reporter = monitor.clone();
        let reported = Arc::new(AtomicBool::new(false));
        let once = reported.clone();
        store.on_ping(move || {
            if !once.swap(true, Ordering::SeqCst) {
                reporter.occur_err(&StoreError::Timeout);
            }
        });

        monitor.occur_err(&StoreError::unavailable("connection refused"));

        // First check answered, but a failure landed while it was in flight
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(reported.load(Ordering::SeqCst));
        assert!(!monitor.is_ok());
        assert_eq!(monitor.error(), Some(StoreError::Timeout));
        assert!(monitor.is_probing());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(monitor.is_ok());
        assert!(monitor.error().is_none());
        assert!(!monitor.is_probing());
        assert_eq!(monitor.probes_started(), 1);

        store.clear_on_ping();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_right_after_recovery_starts_new_prober() {
        let (store, monitor) = monitor();

        monitor.occur_err(&StoreError::Timeout);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(monitor.is_ok());

        // Store still reachable: the new outage must clear again on its own
        monitor.occur_err(&StoreError::Timeout);
        assert!(!monitor.is_ok());
        assert!(monitor.is_probing());
        assert_eq!(monitor.error(), Some(StoreError::Timeout));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(monitor.is_ok());
        assert_eq!(monitor.probes_started(), 2);
        assert!(store.ping_count() >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reporter_racing_recovery_never_strands_monitor() {
        let store = Arc::new(FlakyStore::memory());
        let config = HealthConfig::default().with_probe_interval(Duration::from_millis(1));
        let monitor = HealthMonitor::new(store, config);

        for _ in 0..50 {
            monitor.occur_err(&StoreError::Timeout);

            // Report again the moment the store looks healthy
            let reporter = monitor.clone();
            tokio::task::spawn_blocking(move || {
                while !reporter.is_ok() {
                    std::hint::spin_loop();
                }
                reporter.occur_err(&StoreError::Timeout);
            })
            .await
            .unwrap();

            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            while !monitor.is_ok() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            assert!(monitor.is_ok());
            assert!(monitor.error().is_none());
        }
    }

    #[test]
    fn test_occur_err_without_runtime_only_records() {
        let (_, monitor) = monitor();
        monitor.occur_err(&StoreError::Timeout);

        assert!(!monitor.is_ok());
        assert!(!monitor.is_probing());
        assert_eq!(monitor.probes_started(), 0);
        assert_eq!(monitor.error(), Some(StoreError::Timeout));

        // A later report from inside a runtime starts recovery
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            monitor.occur_err(&StoreError::Timeout);
            assert_eq!(monitor.probes_started(), 1);

            tokio::time::sleep(Duration::from_millis(600)).await;
            assert!(monitor.is_ok());
        });
    }

    #[test]
    fn test_runtime_shutdown_frees_prober_slot() {
        let (store, monitor) = monitor();
        store.fail();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async { monitor.occur_err(&StoreError::Timeout) });
        assert!(monitor.is_probing());
        drop(runtime);
        assert!(!monitor.is_probing());

        store.recover();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            monitor.occur_err(&StoreError::Timeout);
            tokio::time::sleep(Duration::from_millis(600)).await;
            assert!(monitor.is_ok());
        });
        assert_eq!(monitor.probes_started(), 2);
    }
}
