//! Live-latency sync server
//!
//! Serves the `/sync` signaling endpoint plus the latency-target and
//! telemetry management API.
//!
//! Usage:
//!   PORT=3000 LATENCY_TARGET=12 LATENCY_TARGETS=3,6,9 cargo run --release

use std::sync::Arc;

use axum::http::HeaderName;
use livesync_core::SyncService;
use livesync_server::{config::ServerConfig, routes};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livesync_server=info,livesync_core=info,tower_http=warn".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        "latency target {}s, ladder {:?}",
        config.initial_target.target_latency_secs, config.initial_target.latency_targets
    );

    let service = Arc::new(SyncService::new(config.initial_target.clone()));

    // Clients read the signaling header cross-origin, so it must be exposed
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("cmsd-dynamic")]);

    let app = routes::router(service).layer(
        tower::ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sync server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
