//! Server configuration from environment variables

use livesync_core::SyncTarget;
use tracing::warn;

/// Default HTTP port
const DEFAULT_PORT: u16 = 3000;

/// Default bind address
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub initial_target: SyncTarget,
}

impl ServerConfig {
    /// Load from `BIND_ADDR`, `PORT`, `LATENCY_TARGET` and
    /// `LATENCY_TARGETS`, falling back to defaults on missing or
    /// malformed values.
    pub fn from_env() -> Self {
        let mut initial_target = SyncTarget::default();

        if let Some(raw) = env_var("LATENCY_TARGET") {
            match raw.parse::<f64>() {
                Ok(target) if target.is_finite() => initial_target.target_latency_secs = target,
                _ => warn!("ignoring malformed LATENCY_TARGET {:?}", raw),
            }
        }

        if let Some(raw) = env_var("LATENCY_TARGETS") {
            match parse_targets(&raw) {
                Some(targets) => initial_target.latency_targets = targets,
                None => warn!("ignoring malformed LATENCY_TARGETS {:?}", raw),
            }
        }

        let port = env_var("PORT")
            .and_then(|raw| match raw.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!("ignoring malformed PORT {:?}", raw);
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);

        Self {
            bind_addr: env_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port,
            initial_target,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parse a comma-separated latency ladder like `3,6,9`.
fn parse_targets(raw: &str) -> Option<Vec<f64>> {
    let targets = raw
        .split(',')
        .map(|entry| entry.trim().parse::<f64>().ok().filter(|n| n.is_finite()))
        .collect::<Option<Vec<f64>>>()?;
    (!targets.is_empty()).then_some(targets)
}
