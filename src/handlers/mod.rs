//! HTTP handlers exposing the health gate
//!
//! Services that already run an axum server mount [`router`] to answer
//! readiness probes from the gate's cached verdict.

use crate::gate::HealthGate;
use axum::{Router, routing::get};
use std::sync::Arc;

pub mod health;

/// Router with `GET /health` backed by `gate`
pub fn router(gate: Arc<HealthGate>) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .with_state(gate)
}
