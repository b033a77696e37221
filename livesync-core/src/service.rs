//! Server-side sync orchestration
//!
//! Owns the telemetry store and the shared latency target; request
//! handlers delegate here so the HTTP layer stays a thin shell. One
//! instance is constructed at startup and passed to every handler.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::cmsd;
use crate::signal::{self, SignalValue};
use crate::target::{new_shared_target, SharedSyncTarget, SyncTarget};
use crate::telemetry::{TelemetryPoint, TelemetryStore};
use crate::time::epoch_ms;

#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("Missing CMCD parameter in request query")]
    MissingSignal,
    #[error("Missing latencyTarget and/or latencyTargets parameter in request body")]
    MissingTargetFields,
}

/// Shared state behind the sync endpoints.
pub struct SyncService {
    telemetry: TelemetryStore,
    target: SharedSyncTarget,
}

impl SyncService {
    pub fn new(initial_target: SyncTarget) -> Self {
        Self {
            telemetry: TelemetryStore::new(),
            target: new_shared_target(initial_target),
        }
    }

    /// Process one sync exchange: record the decoded report and return
    /// the `Cmsd-Dynamic` header value for the current target.
    pub fn handle_sync(&self, signal_param: Option<&str>) -> Result<String, SyncError> {
        let raw = signal_param.ok_or(SyncError::MissingSignal)?;
        let now_ms = epoch_ms();

        self.record_report(now_ms, &signal::decode(raw));

        let target = self.target.read().clone();
        let server_time = target.clock_sync_enabled.then_some(now_ms);
        Ok(cmsd::dynamic_header(&target, server_time))
    }

    /// Extract the modeled keys from a decoded report and persist them.
    /// Reports without a usable session id, latency or timestamp are
    /// logged and dropped; the exchange itself still succeeds.
    fn record_report(&self, now_ms: i64, report: &signal::SignalMap) {
        let session_id = report.get(cmsd::KEY_SESSION_ID).and_then(SignalValue::to_text);
        let latency = report.get(cmsd::KEY_LATENCY_REPORT).and_then(SignalValue::as_f64);
        let timestamp = report.get(cmsd::KEY_TIMESTAMP).and_then(SignalValue::as_f64);

        let (Some(session_id), Some(latency), Some(timestamp)) = (session_id, latency, timestamp)
        else {
            warn!("report missing usable sid/ltc/ts fields, not saved");
            return;
        };

        self.telemetry
            .record_at(now_ms, &session_id, latency, timestamp as i64);
    }

    /// Apply an explicit latency-target update and return the new state.
    pub fn update_target(
        &self,
        target_latency_secs: f64,
        latency_targets: Vec<f64>,
        disable_clock_sync: Option<bool>,
    ) -> SyncTarget {
        let mut target = self.target.write();
        target.update(target_latency_secs, latency_targets, disable_clock_sync);
        info!(
            "updated latency target to {}s, ladder {:?}",
            target.target_latency_secs, target.latency_targets
        );
        target.clone()
    }

    pub fn current_target(&self) -> SyncTarget {
        self.target.read().clone()
    }

    /// Full telemetry snapshot for the reporting endpoint.
    pub fn player_data(&self) -> HashMap<String, Vec<TelemetryPoint>> {
        self.telemetry.snapshot()
    }

    pub fn clear_player_data(&self) {
        self.telemetry.clear();
    }
}
