//! Client-server clock synchronization
//!
//! Estimates the offset between the server and client wall clocks from
//! three-timestamp exchanges (T0 request sent, T1 server time, T2
//! response received), averaged over a sliding window to smooth out
//! network jitter.

use std::collections::VecDeque;
use tracing::debug;

use crate::time::epoch_ms;

/// Number of offset samples kept for averaging
const OFFSET_SAMPLE_COUNT: usize = 10;

/// Clock-offset estimator with at most one exchange cycle in flight.
#[derive(Debug, Default)]
pub struct ClockSynchronizer {
    /// Recent offset samples in milliseconds, oldest first
    samples: VecDeque<f64>,
    /// Cached arithmetic mean of the window
    mean_offset_ms: f64,
    /// Cleared periodically to force resynchronization
    synchronized: bool,
    /// T0 of the in-flight cycle, if any
    cycle_t0_ms: Option<i64>,
}

impl ClockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a synchronization cycle, recording T0.
    ///
    /// A no-op while the clock is still considered synchronized or while
    /// a cycle is already in flight: the first cycle keeps its own T0, so
    /// two overlapping exchanges cannot each capture a start time.
    pub fn start_cycle(&mut self) {
        self.start_cycle_at(epoch_ms());
    }

    pub fn start_cycle_at(&mut self, now_ms: i64) {
        if !self.synchronized && self.cycle_t0_ms.is_none() {
            self.cycle_t0_ms = Some(now_ms);
        }
    }

    /// Complete the in-flight cycle with the server's reported time (T1).
    ///
    /// Computes `offset = T1 - (T0 + T2) / 2`, pushes it into the sample
    /// window and recomputes the mean. An out-of-order completion that
    /// finds no cycle in flight is dropped.
    pub fn end_cycle(&mut self, server_time_ms: i64) {
        self.end_cycle_at(server_time_ms, epoch_ms());
    }

    pub fn end_cycle_at(&mut self, server_time_ms: i64, now_ms: i64) {
        let Some(t0) = self.cycle_t0_ms.take() else {
            debug!("dropping clock-sync completion with no cycle in flight");
            return;
        };

        let t2 = now_ms;
        let offset = server_time_ms as f64 - (t0 + t2) as f64 / 2.0;

        if self.samples.len() >= OFFSET_SAMPLE_COUNT {
            self.samples.pop_front();
        }
        self.samples.push_back(offset);
        self.mean_offset_ms = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        self.synchronized = true;

        debug!(
            "clock synchronized: offset {:.1}ms over {} samples",
            self.mean_offset_ms,
            self.samples.len()
        );
    }

    /// Clear the synchronized flag so the next exchange resynchronizes.
    /// An in-flight cycle and the sample window are left untouched.
    pub fn invalidate(&mut self) {
        self.synchronized = false;
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn is_in_progress(&self) -> bool {
        self.cycle_t0_ms.is_some()
    }

    /// Mean server-minus-client clock offset in milliseconds.
    pub fn offset_ms(&self) -> f64 {
        self.mean_offset_ms
    }

    /// Client wall clock corrected by the estimated offset.
    pub fn client_time_ms(&self) -> i64 {
        epoch_ms() + self.mean_offset_ms.round() as i64
    }
}
