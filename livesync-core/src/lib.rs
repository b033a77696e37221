//! Live-latency sync core
//!
//! Signals and enforces a live-streaming latency target between a media
//! server and its playing clients: compact key-value signaling, clock
//! synchronization, playback-rate control and per-session telemetry.

pub mod client;
pub mod clock;
pub mod cmsd;
pub mod player;
pub mod rate;
pub mod service;
pub mod signal;
pub mod target;
pub mod telemetry;
mod time;

// Re-exports for convenience
pub use client::{SyncClient, SyncClientConfig, SyncClientHandle};
pub use clock::ClockSynchronizer;
pub use player::PlayerAdapter;
pub use rate::{decide, RateControlConfig, RateRule};
pub use service::{SyncError, SyncService};
pub use target::SyncTarget;
pub use telemetry::{TelemetryPoint, TelemetryStore};
