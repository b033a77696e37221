//! Shared latency-target state
//!
//! The target advertised to every client on each sync response. Mutated
//! only through an explicit update, read on every exchange.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Default target latency in seconds
const DEFAULT_TARGET_LATENCY_SECS: f64 = 12.0;

/// Default ladder of selectable latency targets in seconds
const DEFAULT_LATENCY_TARGETS: [f64; 3] = [3.0, 6.0, 9.0];

/// The server-wide latency target state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncTarget {
    /// Desired distance from the live edge, seconds
    pub target_latency_secs: f64,
    /// Selectable targets advertised to clients, seconds
    pub latency_targets: Vec<f64>,
    /// When false the sync response omits the server time key
    pub clock_sync_enabled: bool,
}

impl Default for SyncTarget {
    fn default() -> Self {
        Self {
            target_latency_secs: DEFAULT_TARGET_LATENCY_SECS,
            latency_targets: DEFAULT_LATENCY_TARGETS.to_vec(),
            clock_sync_enabled: true,
        }
    }
}

impl SyncTarget {
    /// Apply an explicit target update. The clock-sync flag only changes
    /// when the update carries it.
    pub fn update(
        &mut self,
        target_latency_secs: f64,
        latency_targets: Vec<f64>,
        disable_clock_sync: Option<bool>,
    ) {
        self.target_latency_secs = target_latency_secs;
        self.latency_targets = latency_targets;
        if let Some(disable) = disable_clock_sync {
            self.clock_sync_enabled = !disable;
        }
    }
}

/// Read-mostly shared handle to the target state.
pub type SharedSyncTarget = Arc<RwLock<SyncTarget>>;

/// Create a new shared target handle.
pub fn new_shared_target(target: SyncTarget) -> SharedSyncTarget {
    Arc::new(RwLock::new(target))
}
