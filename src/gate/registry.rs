//! Construct-once ownership of the health gate
//!
//! A [`GateRegistry`] holds at most one live [`HealthGate`]. Creating a second
//! one while the first is registered fails with
//! [`GateError::AlreadyInitialized`]. Applications can own a registry and hand
//! out the gate by `Arc`, or use the process-wide registry behind [`create`],
//! [`get_instance`] and [`shutdown`].

use super::HealthGate;
use crate::client::TaskQueueClient;
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use parking_lot::Mutex;
use std::sync::Arc;

static GLOBAL: GateRegistry = GateRegistry::new();

/// Slot holding the single live gate
#[derive(Debug, Default)]
pub struct GateRegistry {
    slot: Mutex<Option<Arc<HealthGate>>>,
}

impl GateRegistry {
    pub const fn new() -> Self {
        Self {
            slot: parking_lot::const_mutex(None),
        }
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static GateRegistry {
        &GLOBAL
    }

    /// Build and register a gate, failing if one is already registered
    ///
    /// The slot stays locked while the gate is built, so two racing callers
    /// cannot both succeed.
    pub fn create(
        &self,
        client: Arc<dyn TaskQueueClient>,
        config: GateConfig,
    ) -> GateResult<Arc<HealthGate>> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(GateError::AlreadyInitialized);
        }

        let gate = Arc::new(HealthGate::new(client, config));
        *slot = Some(gate.clone());
        Ok(gate)
    }

    /// The registered gate, if any
    pub fn get_instance(&self) -> Option<Arc<HealthGate>> {
        self.slot.lock().clone()
    }

    /// Stop the registered gate's monitor and empty the slot
    ///
    /// Returns whether a gate was registered. Afterwards a new gate may be
    /// created; handles to the old one keep working but are no longer
    /// reachable through the registry.
    pub async fn shutdown(&self) -> bool {
        let gate = self.slot.lock().take();
        match gate {
            Some(gate) => {
                gate.shutdown().await;
                tracing::info!("Health gate shut down");
                true
            }
            None => false,
        }
    }
}

/// Create the process-wide gate
pub fn create(client: Arc<dyn TaskQueueClient>, config: GateConfig) -> GateResult<Arc<HealthGate>> {
    GateRegistry::global().create(client, config)
}

/// The process-wide gate, if one was created
pub fn get_instance() -> Option<Arc<HealthGate>> {
    GateRegistry::global().get_instance()
}

/// Shut down and unregister the process-wide gate
pub async fn shutdown() -> bool {
    GateRegistry::global().shutdown().await
}
