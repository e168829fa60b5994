//! Health status gate
//!
//! Serves the last composite verdict from a TTL cache and falls back to a
//! live evaluation on a miss. An optional background monitor keeps the cache
//! warm so foreground callers rarely pay for a probe.
//!
//! Concurrent cache misses are not coalesced: two callers that miss at the
//! same moment each run an evaluation, and whichever `set` lands last wins.
//! Evaluations are cheap next to typical TTLs, so this is accepted rather than
//! guarded against.

mod monitor;
pub mod registry;

pub use registry::{GateRegistry, create, get_instance, shutdown};

use crate::cache::BoundedTtlCache;
use crate::client::TaskQueueClient;
use crate::config::GateConfig;
use crate::evaluator::{HealthEvaluator, HealthReport};
use monitor::MonitorHandle;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cache key under which the composite verdict is stored
pub(crate) const HEALTH_STATUS_KEY: &str = "celery_health_status";

pub(crate) type StatusCache = BoundedTtlCache<&'static str, bool>;

/// Cached composite health gate for one task-queue application
///
/// Obtain one through [`GateRegistry::create`] (or the process-wide
/// [`create`]) and share the returned `Arc`.
pub struct HealthGate {
    config: GateConfig,
    evaluator: HealthEvaluator,
    cache: Arc<StatusCache>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl std::fmt::Debug for HealthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthGate")
            .field("config", &self.config)
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}

impl HealthGate {
    /// Build a gate; callers go through a [`GateRegistry`] to keep it unique
    pub(crate) fn new(client: Arc<dyn TaskQueueClient>, config: GateConfig) -> Self {
        let evaluator = HealthEvaluator::new(client, &config);
        let cache = Arc::new(BoundedTtlCache::new(
            config.cache_capacity(),
            config.cache_ttl(),
        ));

        tracing::info!(
            cache_ttl_ms = config.cache_ttl().as_millis() as u64,
            inspect_timeout_ms = config.inspect_timeout().as_millis() as u64,
            monitoring_interval_ms = config.monitoring_interval().as_millis() as u64,
            "Health gate initialized"
        );

        Self {
            config,
            evaluator,
            cache,
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Composite verdict, from cache when fresh, otherwise evaluated now
    pub async fn is_healthy(&self) -> bool {
        if let Some(status) = self.cache.get(HEALTH_STATUS_KEY) {
            tracing::debug!(healthy = status, "Returning cached health status");
            return status;
        }

        let status = self.evaluator.evaluate().await;
        self.cache.set(HEALTH_STATUS_KEY, status);
        status
    }

    /// The cached verdict if one is fresh; never triggers an evaluation
    pub fn cached_status(&self) -> Option<bool> {
        self.cache.get(HEALTH_STATUS_KEY)
    }

    /// Drop the cached verdict so the next `is_healthy` evaluates
    pub fn invalidate(&self) {
        self.cache.remove(HEALTH_STATUS_KEY);
    }

    pub async fn check_broker(&self) -> bool {
        self.evaluator.check_broker().await
    }

    pub async fn check_backend(&self) -> bool {
        self.evaluator.check_backend().await
    }

    pub async fn check_workers(&self) -> bool {
        self.evaluator.check_workers().await
    }

    /// Run a full evaluation, bypassing and not updating the cache
    pub async fn evaluate(&self) -> HealthReport {
        self.evaluator.evaluate_report().await
    }

    /// Start the background monitor
    ///
    /// The first evaluation runs immediately, then once per monitoring interval.
    /// Must be called from within a tokio runtime. Starting while a monitor is
    /// already running only logs a warning.
    pub fn start_monitoring(&self) {
        let mut monitor = self.monitor.lock();

        if monitor.as_ref().is_some_and(MonitorHandle::is_running) {
            tracing::warn!("Health monitoring is already running");
            return;
        }

        *monitor = Some(MonitorHandle::spawn(
            self.evaluator.clone(),
            self.cache.clone(),
            self.config.monitoring_interval(),
        ));
        tracing::info!(
            interval_ms = self.config.monitoring_interval().as_millis() as u64,
            "Started periodic health monitoring"
        );
    }

    /// Stop the background monitor, waiting at most the configured stop timeout
    ///
    /// Best effort: if the loop does not exit in time it is detached and this
    /// returns anyway. A no-op when no monitor is running.
    pub async fn stop_monitoring(&self) {
        // Take the handle out before awaiting; the lock is never held across an await.
        let handle = self.monitor.lock().take();
        let Some(handle) = handle else {
            return;
        };

        let timeout = self.config.stop_timeout();
        if handle.stop(timeout).await {
            tracing::info!("Health monitoring stopped");
        } else {
            tracing::info!(
                timeout_ms = timeout.as_millis() as u64,
                "Health monitoring did not stop in time; detached"
            );
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(MonitorHandle::is_running)
    }

    /// Release everything the gate runs in the background
    pub async fn shutdown(&self) {
        self.stop_monitoring().await;
    }
}

impl Drop for HealthGate {
    fn drop(&mut self) {
        // Cannot await here; make sure an orphaned loop at least stops ticking.
        if let Some(handle) = self.monitor.get_mut().as_ref() {
            handle.cancel();
        }
    }
}
