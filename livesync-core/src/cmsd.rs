//! `Cmsd-Dynamic` header construction and parsing
//!
//! The server advertises its latency target through a fixed-key response
//! header; the client reads it back to retarget playback and finish a
//! clock-synchronization cycle.

use crate::signal::{self, SignalValue};
use crate::target::SyncTarget;

/// Response header carrying the signaling dictionary.
pub const CMSD_DYNAMIC_HEADER: &str = "Cmsd-Dynamic";

/// Target latency in seconds.
pub const KEY_LATENCY: &str = "com.svta-latency";
/// Comma-separated ladder of selectable latency targets in seconds.
pub const KEY_LATENCY_TARGETS: &str = "com.svta-latency-targets";
/// Server wall clock in epoch milliseconds; omitted when clock sync is
/// disabled.
pub const KEY_TIME: &str = "com.svta-time";

/// Session id the client reports.
pub const KEY_SESSION_ID: &str = "sid";
/// Live latency reported by the client, seconds.
pub const KEY_LATENCY_REPORT: &str = "ltc";
/// Client wall clock at report time, epoch milliseconds.
pub const KEY_TIMESTAMP: &str = "ts";
/// Playhead program time, epoch milliseconds.
pub const KEY_PLAYHEAD: &str = "pt";
/// Current playback-rate multiplier.
pub const KEY_PLAYBACK_RATE: &str = "pr";
/// Buffered media ahead of the playhead, milliseconds.
pub const KEY_BUFFER_LENGTH: &str = "bl";

/// Build the `Cmsd-Dynamic` value for the current target. Server time is
/// included only when given (i.e. clock sync is enabled).
pub fn dynamic_header(target: &SyncTarget, server_time_ms: Option<i64>) -> String {
    let targets = target
        .latency_targets
        .iter()
        .map(|t| signal::format_number(*t))
        .collect::<Vec<_>>()
        .join(",");

    let mut header = format!(
        "{}=\"{}\",{}=\"{}\"",
        KEY_LATENCY,
        signal::format_number(target.target_latency_secs),
        KEY_LATENCY_TARGETS,
        targets,
    );
    if let Some(time) = server_time_ms {
        header.push_str(&format!(",{}=\"{}\"", KEY_TIME, time));
    }
    header
}

/// The latency-target state a client extracts from a sync response.
///
/// Keys that are absent or fail to parse as numbers stay unset so the
/// corresponding state update is skipped rather than applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResponse {
    pub target_latency_secs: Option<f64>,
    pub latency_targets: Option<Vec<f64>>,
    pub server_time_ms: Option<i64>,
}

impl SyncResponse {
    /// Parse a `Cmsd-Dynamic` header value.
    pub fn parse(header: &str) -> Self {
        let map = signal::decode(header);

        let target_latency_secs = map.get(KEY_LATENCY).and_then(SignalValue::as_f64);

        let latency_targets = map.get(KEY_LATENCY_TARGETS).and_then(|value| match value {
            SignalValue::Text(list) => list
                .split(',')
                .map(|entry| entry.trim().parse::<f64>().ok().filter(|n| n.is_finite()))
                .collect::<Option<Vec<f64>>>(),
            SignalValue::Number(n) => Some(vec![*n]),
            SignalValue::Flag => None,
        });

        let server_time_ms = map
            .get(KEY_TIME)
            .and_then(SignalValue::as_f64)
            .map(|t| t as i64);

        Self {
            target_latency_secs,
            latency_targets,
            server_time_ms,
        }
    }
}
