//! ZX Spectrum emulator fleet control daemon (zxdaemond)
//!
//! Standalone service that:
//! - Owns the emulator manager registry and batch command dispatcher
//! - Exposes REST API and WebSocket events over the control-plane surface
//! - Serialises/deserialises SNA/Z80 snapshots and TRD/SCL disk images
//!
//! Default bind: 0.0.0.0:8090
//! WebSocket: /api/v1/websocket
//! REST API: /api/v1/*

mod api;
mod batch;
mod config;
mod cpu;
mod disk;
mod error;
mod events;
mod instance;
mod manager;
mod memory;
mod peripherals;
mod snapshot;
mod tracing_layer;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let daemon_config = config::DaemonConfig::from_env();

    // Event bus is created first so the tracing layer can re-broadcast
    // log lines over the same WebSocket bus API responses use.
    let bus = events::EventBus::new();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(tracing_layer::WebSocketLayer::new(bus.clone()))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,zxdaemon=debug")),
        )
        .init();

    info!("Starting ZX Spectrum emulator fleet control daemon (zxdaemond)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let manager = Arc::new(manager::EmulatorManager::new(bus.clone()));
    let dispatcher = Arc::new(batch::BatchDispatcher::new(manager.clone(), daemon_config.batch_workers));

    let app = api::create_router(manager, dispatcher, bus);

    // Port binding is probed before handing control to the transport
    // framework; if the port is busy the control plane reports the
    // condition and terminates without exiting the host process — the
    // caller (a supervising process manager) decides whether that is
    // fatal.
    let listener = match tokio::net::TcpListener::bind(&daemon_config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {}", daemon_config.bind_addr, e);
            return Ok(());
        }
    };

    info!("zxdaemond listening on http://{}", daemon_config.bind_addr);
    info!("WebSocket events: ws://{}/api/v1/websocket", daemon_config.bind_addr);
    info!("Swagger UI: http://{}/swagger-ui", daemon_config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
