//! Background refresh loop
//!
//! Re-evaluates health on a fixed interval and writes each verdict into the
//! gate's cache so foreground callers mostly hit a warm entry. Cancellation is
//! observed only between iterations; an evaluation in flight always finishes.

use super::{HEALTH_STATUS_KEY, StatusCache};
use crate::evaluator::{HealthEvaluator, panic_message};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A running monitor task and the token that stops it
#[derive(Debug)]
pub(crate) struct MonitorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Spawn the loop on the current tokio runtime
    pub(crate) fn spawn(
        evaluator: HealthEvaluator,
        cache: Arc<StatusCache>,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(evaluator, cache, interval, token.clone()));
        Self { token, task }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the loop to stop without waiting for it
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Signal the loop and wait up to `timeout` for it to exit
    ///
    /// Returns `false` if the task was still running when the wait expired;
    /// the task is then left to finish on its own.
    pub(crate) async fn stop(self, timeout: Duration) -> bool {
        self.token.cancel();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Health monitor task ended abnormally");
                true
            }
            Err(_) => false,
        }
    }
}

async fn run(
    evaluator: HealthEvaluator,
    cache: Arc<StatusCache>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        "Health monitor loop running"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Checks contain their own panics; this only guards the loop itself.
        match AssertUnwindSafe(evaluator.evaluate()).catch_unwind().await {
            Ok(status) => {
                cache.set(HEALTH_STATUS_KEY, status);
                tracing::debug!(healthy = status, "Scheduled health check completed");
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(error = %reason, "Health monitor iteration panicked");
            }
        }
    }

    tracing::debug!("Health monitor loop observed cancellation");
}
