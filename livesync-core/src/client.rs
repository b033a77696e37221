//! Client-side sync orchestration
//!
//! Drives the latency feedback loop against the sync server: a report
//! loop that exchanges signaling with `/sync`, a rate-control loop that
//! nudges the playback rate toward the target latency, and an
//! invalidation loop that forces periodic clock resynchronization.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::clock::ClockSynchronizer;
use crate::cmsd::{self, SyncResponse};
use crate::player::PlayerAdapter;
use crate::rate::{self, RateConfigError, RateControlConfig};
use crate::signal::{self, SignalMap, SignalValue};
use crate::time::epoch_ms;

/// How often the client reports latency and refreshes its target
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// How often the rate controller re-evaluates the playback rate
const DEFAULT_RATE_INTERVAL: Duration = Duration::from_millis(100);

/// How often the clock sync is invalidated to force resynchronization
const DEFAULT_CLOCK_RESYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Timeout for one sync exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Session id alphabet and length (CMCD `sid` style)
const SESSION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SESSION_ID_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid rate-control config: {0}")]
    Config(#[from] RateConfigError),

    #[error("sync response carried no usable Cmsd-Dynamic header")]
    MissingHeader,
}

/// Tuning knobs for a [`SyncClient`].
#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    pub rate_control: RateControlConfig,
    pub report_interval: Duration,
    pub rate_interval: Duration,
    pub clock_resync_interval: Duration,
    /// When set, a live-sync difference beyond this many seconds triggers
    /// a hard seek back onto the target instead of a rate change.
    pub hard_seek_threshold_secs: Option<f64>,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            rate_control: RateControlConfig::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            rate_interval: DEFAULT_RATE_INTERVAL,
            clock_resync_interval: DEFAULT_CLOCK_RESYNC_INTERVAL,
            hard_seek_threshold_secs: None,
        }
    }
}

/// Client-side orchestrator for one player instance.
pub struct SyncClient {
    http: Client,
    sync_url: String,
    session_id: String,
    player: Arc<dyn PlayerAdapter>,
    clock: Arc<RwLock<ClockSynchronizer>>,
    target_latency_secs: Arc<RwLock<Option<f64>>>,
    latency_targets: Arc<RwLock<Vec<f64>>>,
    config: SyncClientConfig,
}

impl SyncClient {
    /// Create a client against `server_base_url` with default tuning.
    pub fn new(server_base_url: &str, player: Arc<dyn PlayerAdapter>) -> Result<Self, ClientError> {
        Self::with_config(server_base_url, player, SyncClientConfig::default())
    }

    pub fn with_config(
        server_base_url: &str,
        player: Arc<dyn PlayerAdapter>,
        config: SyncClientConfig,
    ) -> Result<Self, ClientError> {
        config.rate_control.validate()?;

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            sync_url: format!("{}/sync", server_base_url.trim_end_matches('/')),
            session_id: random_session_id(),
            player,
            clock: Arc::new(RwLock::new(ClockSynchronizer::new())),
            target_latency_secs: Arc::new(RwLock::new(None)),
            latency_targets: Arc::new(RwLock::new(Vec::new())),
            config,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Latest ladder of selectable targets received from the server.
    pub fn latency_targets(&self) -> Vec<f64> {
        self.latency_targets.read().clone()
    }

    /// Spawn the report, rate-control and clock-invalidation loops.
    ///
    /// The returned handle cancels all three; cancellation stops future
    /// ticks but never aborts an exchange already in flight.
    pub fn start(self) -> SyncClientHandle {
        let (report_cancel, mut report_cancel_rx) = oneshot::channel();
        let (rate_cancel, mut rate_cancel_rx) = oneshot::channel();
        let (clock_cancel, mut clock_cancel_rx) = oneshot::channel();

        info!("sync client {} started against {}", self.session_id, self.sync_url);

        // Report loop: one signaling exchange per tick
        {
            let http = self.http.clone();
            let sync_url = self.sync_url.clone();
            let session_id = self.session_id.clone();
            let player = Arc::clone(&self.player);
            let clock = Arc::clone(&self.clock);
            let target_latency = Arc::clone(&self.target_latency_secs);
            let latency_targets = Arc::clone(&self.latency_targets);
            let interval = self.config.report_interval;

            tokio::spawn(async move {
                loop {
                    if !matches!(report_cancel_rx.try_recv(), Err(TryRecvError::Empty)) {
                        debug!("report loop cancelled");
                        break;
                    }

                    if let Err(e) = report_tick(
                        &http,
                        &sync_url,
                        &session_id,
                        &player,
                        &clock,
                        &target_latency,
                        &latency_targets,
                    )
                    .await
                    {
                        // Skip this tick; the next one retries naturally
                        warn!("sync exchange failed: {}", e);
                    }

                    tokio::time::sleep(interval).await;
                }
            });
        }

        // Rate-control loop: re-evaluate the playback rate while playing
        {
            let player = Arc::clone(&self.player);
            let clock = Arc::clone(&self.clock);
            let target_latency = Arc::clone(&self.target_latency_secs);
            let config = self.config.clone();

            tokio::spawn(async move {
                loop {
                    if !matches!(rate_cancel_rx.try_recv(), Err(TryRecvError::Empty)) {
                        debug!("rate loop cancelled");
                        break;
                    }

                    rate_tick(&player, &clock, &target_latency, &config);

                    tokio::time::sleep(config.rate_interval).await;
                }
            });
        }

        // Invalidation loop: force the next exchange to resynchronize
        {
            let clock = Arc::clone(&self.clock);
            let interval = self.config.clock_resync_interval;

            tokio::spawn(async move {
                loop {
                    if !matches!(clock_cancel_rx.try_recv(), Err(TryRecvError::Empty)) {
                        debug!("clock invalidation loop cancelled");
                        break;
                    }

                    tokio::time::sleep(interval).await;
                    clock.write().invalidate();
                }
            });
        }

        SyncClientHandle {
            cancels: [Some(report_cancel), Some(rate_cancel), Some(clock_cancel)],
        }
    }
}

/// Cancels the sync loops when stopped or dropped.
pub struct SyncClientHandle {
    cancels: [Option<oneshot::Sender<()>>; 3],
}

impl SyncClientHandle {
    pub fn stop(mut self) {
        self.cancel_all();
    }

    fn cancel_all(&mut self) {
        for cancel in &mut self.cancels {
            if let Some(tx) = cancel.take() {
                let _ = tx.send(());
            }
        }
    }
}

impl Drop for SyncClientHandle {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// One report-loop tick: build the outgoing signal, exchange it with the
/// server and apply the response.
async fn report_tick(
    http: &Client,
    sync_url: &str,
    session_id: &str,
    player: &Arc<dyn PlayerAdapter>,
    clock: &Arc<RwLock<ClockSynchronizer>>,
    target_latency: &Arc<RwLock<Option<f64>>>,
    latency_targets: &Arc<RwLock<Vec<f64>>>,
) -> Result<(), ClientError> {
    let outgoing = signal::encode(&build_report(session_id, player, clock));

    clock.write().start_cycle();

    let response = http
        .get(sync_url)
        .query(&[("CMCD", outgoing.as_str())])
        .send()
        .await?;

    let header = response
        .headers()
        .get(cmsd::CMSD_DYNAMIC_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ClientError::MissingHeader)?;

    apply_sync_response(
        &SyncResponse::parse(header),
        clock,
        target_latency,
        latency_targets,
    );
    Ok(())
}

/// Build the outgoing signaling map from a point-in-time player snapshot.
fn build_report(
    session_id: &str,
    player: &Arc<dyn PlayerAdapter>,
    clock: &Arc<RwLock<ClockSynchronizer>>,
) -> SignalMap {
    let mut map = SignalMap::new();
    map.insert(
        cmsd::KEY_SESSION_ID.to_string(),
        SignalValue::Text(session_id.to_string()),
    );
    map.insert(
        cmsd::KEY_TIMESTAMP.to_string(),
        SignalValue::Number(epoch_ms() as f64),
    );
    map.insert(
        cmsd::KEY_PLAYBACK_RATE.to_string(),
        SignalValue::Number(player.playback_rate()),
    );
    map.insert(
        cmsd::KEY_BUFFER_LENGTH.to_string(),
        SignalValue::Number((player.buffer_ahead_secs() * 1000.0).round()),
    );
    if let Some(latency) = current_latency_secs(player, clock) {
        map.insert(cmsd::KEY_LATENCY_REPORT.to_string(), SignalValue::Number(latency));
    }
    if let Some(playhead) = player.playhead_time_ms() {
        map.insert(cmsd::KEY_PLAYHEAD.to_string(), SignalValue::Number(playhead as f64));
    }
    map
}

/// Apply a parsed sync response: finish the clock cycle when the server
/// sent its time, then take over the advertised target state.
fn apply_sync_response(
    response: &SyncResponse,
    clock: &Arc<RwLock<ClockSynchronizer>>,
    target_latency: &Arc<RwLock<Option<f64>>>,
    latency_targets: &Arc<RwLock<Vec<f64>>>,
) {
    if let Some(server_time) = response.server_time_ms {
        clock.write().end_cycle(server_time);
    }
    if let Some(latency) = response.target_latency_secs {
        *target_latency.write() = Some(latency);
    }
    if let Some(targets) = &response.latency_targets {
        *latency_targets.write() = targets.clone();
    }
}

/// Live latency: synchronized client time minus playhead program time,
/// in seconds. `None` until the player reports a playhead.
fn current_latency_secs(
    player: &Arc<dyn PlayerAdapter>,
    clock: &Arc<RwLock<ClockSynchronizer>>,
) -> Option<f64> {
    let playhead = player.playhead_time_ms()?;
    Some((clock.read().client_time_ms() - playhead) as f64 / 1000.0)
}

/// One rate-control tick: compute the live-sync difference and apply the
/// resulting decision to the player. No decision is made while paused or
/// while latency or target are still unknown.
fn rate_tick(
    player: &Arc<dyn PlayerAdapter>,
    clock: &Arc<RwLock<ClockSynchronizer>>,
    target_latency: &Arc<RwLock<Option<f64>>>,
    config: &SyncClientConfig,
) {
    if !player.is_playing() {
        return;
    }
    let Some(target) = *target_latency.read() else {
        return;
    };
    let Some(latency) = current_latency_secs(player, clock) else {
        return;
    };

    let difference = latency - target;

    if let Some(threshold) = config.hard_seek_threshold_secs {
        if difference.abs() > threshold {
            if let Some(playhead) = player.playhead_time_ms() {
                debug!("live-sync difference {:.2}s beyond seek threshold, seeking", difference);
                player.seek(playhead + (difference * 1000.0).round() as i64);
                player.set_playback_rate(1.0);
                return;
            }
        }
    }

    player.set_playback_rate(rate::decide(difference, &config.rate_control));
}

/// Generate a random alphanumeric session id.
fn random_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    (0..SESSION_ID_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SESSION_ID_ALPHABET.len());
            SESSION_ID_ALPHABET[idx] as char
        })
        .collect()
}
