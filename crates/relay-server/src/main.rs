//! Relay server binary entry point.
//!
//! Serves the signaling endpoint and the dashboard push channel. TLS is
//! terminated by the hosting process (reverse proxy or tunnel); this
//! binary listens on plain HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:8443, Google STUN, channel label "imu"
//! cargo run -p imu-relay-server
//!
//! # LAN-only deployments can drop STUN entirely
//! cargo run -p imu-relay-server -- --ice-mode none --bind 0.0.0.0:8080
//! ```

use anyhow::Context;
use clap::Parser;
use imu_relay::{IceMode, RelayApp, RelayConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// IMU telemetry relay server
///
/// Answers WebRTC offers from mobile senders and fans decoded telemetry
/// out to dashboard observers over WebSocket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP listener on
    #[arg(long, default_value = "0.0.0.0:8443", env = "RELAY_BIND")]
    bind: SocketAddr,

    /// STUN servers (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302",
        env = "RELAY_STUN_SERVERS"
    )]
    stun_servers: Vec<String>,

    /// ICE mode applied when an offer carries no preference ('none' or 'stun')
    #[arg(long, default_value = "stun", env = "RELAY_ICE_MODE")]
    ice_mode: IceMode,

    /// Label of the sender-created telemetry data channel
    #[arg(long, default_value = "imu", env = "RELAY_CHANNEL_LABEL")]
    channel_label: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %args.bind,
        ice_mode = ?args.ice_mode,
        "imu-relay server starting"
    );

    let config = RelayConfig {
        stun_servers: args.stun_servers,
        default_ice_mode: args.ice_mode,
        channel_label: args.channel_label,
    };
    config.validate()?;

    let app = RelayApp::new(config)?;

    // Browsers hit the signaling endpoint cross-origin from the sender page.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let router = Arc::clone(&app).router().layer(cors);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("listening on {}", args.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app.shutdown().await;
    info!("relay server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
