//! Server-side telemetry of client latency reports
//!
//! Append-only per-session logs, pruned by server-arrival age on every
//! write and on every full read. Retention bounds memory instead of
//! point counts, so pruning a session is O(points in the window).

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;

use crate::time::epoch_ms;

/// Default retention window for telemetry points, one hour
const DEFAULT_RETENTION_MS: i64 = 60 * 60 * 1000;

/// One recorded latency report. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPoint {
    /// Server arrival time in epoch milliseconds; drives retention
    pub server_timestamp: i64,
    /// Latency reported by the player
    pub latency_ms: f64,
    /// The player's own report timestamp in epoch milliseconds
    pub player_report_time: i64,
}

/// Per-session latency log, partitioned by session id so concurrent
/// reports for different sessions never contend.
pub struct TelemetryStore {
    sessions: DashMap<String, Vec<TelemetryPoint>>,
    retention_ms: i64,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::with_retention_ms(DEFAULT_RETENTION_MS)
    }

    pub fn with_retention_ms(retention_ms: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            retention_ms,
        }
    }

    /// Append a report for a session, creating its log on first use, then
    /// prune that session's stale points.
    pub fn record(&self, session_id: &str, latency_ms: f64, player_report_time: i64) {
        self.record_at(epoch_ms(), session_id, latency_ms, player_report_time);
    }

    pub fn record_at(
        &self,
        now_ms: i64,
        session_id: &str,
        latency_ms: f64,
        player_report_time: i64,
    ) {
        let mut log = self.sessions.entry(session_id.to_string()).or_default();
        log.push(TelemetryPoint {
            server_timestamp: now_ms,
            latency_ms,
            player_report_time,
        });
        log.retain(|point| now_ms - point.server_timestamp < self.retention_ms);
    }

    /// Snapshot every session's points, pruning stale points everywhere
    /// and deleting sessions left empty.
    pub fn snapshot(&self) -> HashMap<String, Vec<TelemetryPoint>> {
        self.snapshot_at(epoch_ms())
    }

    pub fn snapshot_at(&self, now_ms: i64) -> HashMap<String, Vec<TelemetryPoint>> {
        self.sessions.retain(|_, log| {
            log.retain(|point| now_ms - point.server_timestamp < self.retention_ms);
            !log.is_empty()
        });
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Empty the entire store.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn test_record_creates_session_log() {
        let store = TelemetryStore::new();
        store.record_at(1_000, "s1", 1.5, 900);
        store.record_at(2_000, "s1", 1.6, 1_900);
        store.record_at(2_000, "s2", 0.5, 1_950);

        let snapshot = store.snapshot_at(3_000);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["s1"].len(), 2);
        assert_eq!(snapshot["s1"][0].latency_ms, 1.5);
        assert_eq!(snapshot["s1"][1].server_timestamp, 2_000);
    }

    #[test]
    fn test_session_removed_once_retention_passes() {
        let store = TelemetryStore::new();
        store.record_at(1_000, "s1", 1.5, 900);

        let snapshot = store.snapshot_at(1_000 + HOUR_MS);
        assert!(snapshot.is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_stale_point_pruned_fresh_point_kept() {
        let store = TelemetryStore::new();
        store.record_at(1_000, "s1", 1.5, 900);
        store.record_at(1_000 + HOUR_MS, "s1", 2.5, HOUR_MS);

        let snapshot = store.snapshot_at(1_000 + HOUR_MS);
        assert_eq!(snapshot["s1"].len(), 1);
        assert_eq!(snapshot["s1"][0].latency_ms, 2.5);
    }

    #[test]
    fn test_prune_runs_on_write() {
        let store = TelemetryStore::new();
        store.record_at(1_000, "s1", 1.5, 900);
        // The write itself prunes the now-stale first point
        store.record_at(1_000 + HOUR_MS + 1, "s1", 2.5, HOUR_MS);

        let snapshot = store.snapshot_at(1_000 + HOUR_MS + 1);
        assert_eq!(snapshot["s1"].len(), 1);
        assert_eq!(snapshot["s1"][0].latency_ms, 2.5);
    }

    #[test]
    fn test_clear() {
        let store = TelemetryStore::new();
        store.record_at(1_000, "s1", 1.5, 900);
        store.record_at(1_000, "s2", 2.5, 900);
        store.clear();
        assert_eq!(store.session_count(), 0);
        assert!(store.snapshot_at(1_001).is_empty());
    }

    #[test]
    fn test_point_serializes_with_wire_names() {
        let point = TelemetryPoint {
            server_timestamp: 1_000,
            latency_ms: 1.5,
            player_report_time: 900,
        };
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "serverTimestamp": 1_000,
                "latencyMs": 1.5,
                "playerReportTime": 900,
            })
        );
    }
}
