//! celery-health-gate - cached health gate for task-queue deployments
//!
//! Answers "is the task pipeline usable right now?" by checking the message
//! broker, the result store and the worker fleet, and caching the composite
//! verdict so callers get a cheap, bounded-latency answer.
//!
//! ```no_run
//! # async fn demo(client: std::sync::Arc<dyn celery_health_gate::client::TaskQueueClient>)
//! # -> celery_health_gate::error::GateResult<()> {
//! use celery_health_gate::{config::GateConfig, gate};
//!
//! let gate = gate::create(client, GateConfig::default())?;
//! gate.start_monitoring();
//! if !gate.is_healthy().await {
//!     tracing::warn!("task pipeline unavailable");
//! }
//! gate::shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod handlers;
pub mod telemetry;

pub use config::GateConfig;
pub use error::{CheckFailure, GateError, GateResult};
pub use evaluator::{HealthEvaluator, HealthReport};
pub use gate::{GateRegistry, HealthGate};
