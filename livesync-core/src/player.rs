//! Player capability interface
//!
//! The sync logic depends only on this trait; each playback backend
//! implements it instead of the core knowing any concrete player type.

/// Capability surface a playback backend must expose to be synchronized.
pub trait PlayerAdapter: Send + Sync {
    /// Playhead position as wall-clock program time in epoch
    /// milliseconds, or `None` before playback is ready.
    fn playhead_time_ms(&self) -> Option<i64>;

    /// Current playback-rate multiplier.
    fn playback_rate(&self) -> f64;

    /// Apply a playback-rate decision.
    fn set_playback_rate(&self, rate: f64);

    /// Seconds of buffered media ahead of the playhead.
    fn buffer_ahead_secs(&self) -> f64;

    /// True while actively playing (not paused, not seeking).
    fn is_playing(&self) -> bool;

    /// Jump the playhead to a program time in epoch milliseconds.
    fn seek(&self, time_ms: i64);
}
