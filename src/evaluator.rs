//! Composite health evaluation
//!
//! Runs the broker, result-store and worker checks and reduces them to one
//! verdict. Every check always runs, in the fixed order broker, backend,
//! workers, so each pass logs all three results even when the first fails.
//! No check can fail outward: collaborator errors and timeouts are classified
//! as [`CheckFailure`], logged and turned into `false`.

use crate::client::{ClientError, TaskQueueClient, TaskState};
use crate::config::GateConfig;
use crate::error::CheckFailure;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Value written to and expected back from the result store
const BACKEND_SENTINEL: &str = "OK";

/// Outcome of one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub broker: bool,
    pub backend: bool,
    pub workers: bool,
}

impl HealthReport {
    /// Composite verdict: every dependency must be healthy
    pub fn is_healthy(&self) -> bool {
        self.broker && self.backend && self.workers
    }
}

/// Timeouts and keys the checks run with
#[derive(Debug, Clone)]
struct CheckSettings {
    broker_connect_timeout: Duration,
    result_store_timeout: Duration,
    inspect_timeout: Duration,
    backend_check_key: String,
}

impl From<&GateConfig> for CheckSettings {
    fn from(config: &GateConfig) -> Self {
        Self {
            broker_connect_timeout: config.broker_connect_timeout(),
            result_store_timeout: config.result_store_timeout(),
            inspect_timeout: config.inspect_timeout(),
            backend_check_key: config.backend_check_key().to_string(),
        }
    }
}

/// Stateless evaluator over a task-queue client
///
/// Cheap to clone and safe to run from many tasks at once.
#[derive(Clone)]
pub struct HealthEvaluator {
    client: Arc<dyn TaskQueueClient>,
    settings: CheckSettings,
}

impl std::fmt::Debug for HealthEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthEvaluator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Log a classified failure at the level its kind calls for and map it to a bool
fn report(check: &'static str, outcome: Result<(), CheckFailure>) -> bool {
    match outcome {
        Ok(()) => {
            tracing::debug!(check = check, "Health check passed");
            true
        }
        Err(failure) if failure.is_warning() => {
            tracing::warn!(check = check, error = %failure, "Health check failed");
            false
        }
        Err(failure) => {
            tracing::error!(check = check, error = %failure, "Health check failed");
            false
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Run one check, turning a panicking collaborator into an evaluation failure
async fn contained<F>(check: &'static str, run: F) -> Result<(), CheckFailure>
where
    F: Future<Output = Result<(), CheckFailure>>,
{
    AssertUnwindSafe(run)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(CheckFailure::Evaluation {
                check,
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            })
        })
}

/// Await `fut`, turning an elapsed `limit` into `on_timeout`
async fn bounded<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> CheckFailure,
) -> Result<T, CheckFailure>
where
    F: Future<Output = Result<T, CheckFailure>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(on_timeout()))
}

impl HealthEvaluator {
    pub fn new(client: Arc<dyn TaskQueueClient>, config: &GateConfig) -> Self {
        Self {
            client,
            settings: CheckSettings::from(config),
        }
    }

    /// Is the broker reachable?
    pub async fn check_broker(&self) -> bool {
        report("broker", contained("broker", self.probe_broker()).await)
    }

    /// Does the result store round-trip a value? Vacuously true when no store is configured.
    pub async fn check_backend(&self) -> bool {
        report("backend", contained("backend", self.probe_backend()).await)
    }

    /// Does at least one worker answer a ping?
    pub async fn check_workers(&self) -> bool {
        report("workers", contained("workers", self.probe_workers()).await)
    }

    /// Run all three checks and return the per-check results
    pub async fn evaluate_report(&self) -> HealthReport {
        let broker = self.check_broker().await;
        let backend = self.check_backend().await;
        let workers = self.check_workers().await;
        let report = HealthReport {
            broker,
            backend,
            workers,
        };

        tracing::debug!(
            broker_ok = broker,
            backend_ok = backend,
            workers_ok = workers,
            healthy = report.is_healthy(),
            "Health evaluation completed"
        );
        report
    }

    /// Run all three checks and return the composite verdict
    pub async fn evaluate(&self) -> bool {
        self.evaluate_report().await.is_healthy()
    }

    async fn probe_broker(&self) -> Result<(), CheckFailure> {
        let url = self.client.broker_url();
        let connectivity = |reason: String| CheckFailure::Connectivity {
            url: url.clone(),
            reason,
        };

        let attempt = async {
            let mut conn = self
                .client
                .open_broker_connection(&url)
                .map_err(|e| connectivity(e.to_string()))?;
            conn.connect().await.map_err(|e| connectivity(e.to_string()))?;
            conn.release().await.map_err(|e| connectivity(e.to_string()))
        };

        let limit = self.settings.broker_connect_timeout;
        bounded(limit, attempt, || {
            connectivity(format!("timed out after {}ms", limit.as_millis()))
        })
        .await
    }

    async fn probe_backend(&self) -> Result<(), CheckFailure> {
        let configured = self
            .client
            .result_store_url()
            .is_some_and(|url| !url.trim().is_empty());
        if !configured {
            tracing::debug!("No result store configured, skipping backend check");
            return Ok(());
        }

        let key = self.settings.backend_check_key.as_str();
        let store_err = |e: ClientError| CheckFailure::Store(e.to_string());

        let attempt = async {
            let store = self.client.result_store().map_err(store_err)?;
            store
                .store_result(key, serde_json::json!(BACKEND_SENTINEL), TaskState::Success)
                .await
                .map_err(store_err)?;
            let meta = store.fetch_result(key).await.map_err(store_err)?;

            if meta.result != serde_json::json!(BACKEND_SENTINEL) {
                return Err(CheckFailure::Store(format!(
                    "unexpected result under key {}: {} (state {:?})",
                    key, meta.result, meta.state
                )));
            }
            Ok(())
        };

        let limit = self.settings.result_store_timeout;
        bounded(limit, attempt, || {
            CheckFailure::Store(format!("timed out after {}ms", limit.as_millis()))
        })
        .await
    }

    async fn probe_workers(&self) -> Result<(), CheckFailure> {
        let limit = self.settings.inspect_timeout;
        let no_workers = || CheckFailure::NoWorkersResponded {
            timeout_ms: limit.as_millis(),
        };

        let attempt = async {
            let replies =
                self.client
                    .ping_workers(limit)
                    .await
                    .map_err(|e| CheckFailure::Evaluation {
                        check: "workers",
                        reason: e.to_string(),
                    })?;

            if replies.is_empty() {
                return Err(no_workers());
            }
            tracing::debug!(
                workers = replies.len(),
                names = ?replies.keys().collect::<Vec<_>>(),
                "Workers answered ping"
            );
            Ok(())
        };

        bounded(limit, attempt, no_workers).await
    }
}
