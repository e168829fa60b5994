//! Task-queue client interface
//!
//! The gate does not speak any broker or result-store protocol itself. It
//! drives whatever task-queue client the application already has through the
//! traits in this module. [`TcpBrokerConnection`] is provided for brokers where
//! "reachable" means "accepts a TCP connection".

pub mod tcp;

pub use tcp::TcpBrokerConnection;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a task-queue client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid broker URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("result store error: {0}")]
    ResultStore(String),

    #[error("worker inspection error: {0}")]
    Inspect(String),
}

/// Task states as recorded by the result store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
    Revoked,
}

/// Result metadata fetched back from the result store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub result: serde_json::Value,
    pub state: TaskState,
}

/// One worker's answer to a liveness ping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    pub ok: String,
}

impl PingReply {
    pub fn pong() -> Self {
        Self {
            ok: "pong".to_string(),
        }
    }
}

/// A broker transport connection that can be opened and released
#[async_trait]
pub trait BrokerConnection: Send {
    /// Establish the connection, failing if the broker is unreachable
    async fn connect(&mut self) -> Result<(), ClientError>;

    /// Release the connection back to the broker
    async fn release(self: Box<Self>) -> Result<(), ClientError>;
}

/// Result store with write and read paths keyed by task id
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store_result(
        &self,
        key: &str,
        result: serde_json::Value,
        state: TaskState,
    ) -> Result<(), ClientError>;

    async fn fetch_result(&self, key: &str) -> Result<TaskMeta, ClientError>;
}

/// What the gate needs from the task-queue application
#[async_trait]
pub trait TaskQueueClient: Send + Sync {
    /// Configured broker URL
    fn broker_url(&self) -> String;

    /// Create (but do not yet connect) a connection to `url`
    fn open_broker_connection(&self, url: &str) -> Result<Box<dyn BrokerConnection>, ClientError>;

    /// Configured result-store URL, `None` or empty when results are disabled
    fn result_store_url(&self) -> Option<String>;

    /// Handle to the configured result store
    fn result_store(&self) -> Result<Arc<dyn ResultStore>, ClientError>;

    /// Ping every reachable worker, collecting replies for up to `timeout`
    async fn ping_workers(
        &self,
        timeout: Duration,
    ) -> Result<BTreeMap<String, PingReply>, ClientError>;
}
