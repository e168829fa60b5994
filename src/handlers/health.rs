//! Health check endpoint
//!
//! Answers readiness probes for monitoring and load balancers from the gate.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::gate::HealthGate;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "OK" or "UNAVAILABLE"
    pub status: &'static str,
    /// Composite verdict of broker, result store and workers
    pub healthy: bool,
}

/// Health check handler
///
/// Returns 200 when the task pipeline is usable and 503 otherwise. The verdict
/// comes from the gate's cache whenever it is fresh.
pub async fn handler(State(gate): State<Arc<HealthGate>>) -> (StatusCode, Json<HealthResponse>) {
    if gate.is_healthy().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK",
                healthy: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "UNAVAILABLE",
                healthy: false,
            }),
        )
    }
}
