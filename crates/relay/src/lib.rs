//! Relay core for inertial-sensor telemetry.
//!
//! Mobile senders negotiate a WebRTC data channel through the signaling
//! endpoint and push fixed 36-byte IMU frames over it; decoded samples are
//! fanned out to every dashboard observer connected over WebSocket.
//!
//! The pieces, leaves first:
//! - [`telemetry`] — binary frame decode
//! - [`registry`] — peer session ownership and lifecycle
//! - [`hub`] — dashboard fan-out
//! - [`session`] — per-peer event loop driving the state machine
//! - [`signaling`] / [`ws`] — the HTTP surface
//! - [`shutdown`] — tracked tasks and graceful drain
//!
//! TLS termination, page rendering and QR generation are collaborators of
//! the hosting process, not part of this crate.

pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod signaling;
pub mod telemetry;
pub mod transport;
pub mod ws;

pub use config::{IceMode, RelayConfig};
pub use error::{Error, Result};

use crate::events::HubEvent;
use crate::hub::DashboardHub;
use crate::registry::PeerSessionRegistry;
use crate::shutdown::TaskGroup;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;

/// Shared application context.
///
/// Owns the peer registry, the dashboard hub and the tracked task set;
/// handlers receive it by `Arc` rather than reaching for ambient state.
pub struct RelayApp {
    config: RelayConfig,
    pub registry: PeerSessionRegistry,
    pub hub: DashboardHub,
    pub tasks: TaskGroup,
    api: API,
    shutting_down: AtomicBool,
}

impl RelayApp {
    /// Build the application context, including the WebRTC API stack.
    pub fn new(config: RelayConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| Error::Config(format!("webrtc media engine: {e}")))?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| Error::Config(format!("webrtc interceptors: {e}")))?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Arc::new(Self {
            config,
            registry: PeerSessionRegistry::new(),
            hub: DashboardHub::new(),
            tasks: TaskGroup::new(),
            api,
            shutting_down: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub(crate) fn api(&self) -> &API {
        &self.api
    }

    /// ICE server set for a peer connection, per the offer's preference.
    pub(crate) fn ice_servers(&self, mode: IceMode) -> Vec<RTCIceServer> {
        match mode {
            IceMode::None => vec![],
            IceMode::Stun => self
                .config
                .stun_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
        }
    }

    /// The HTTP surface: signaling plus the dashboard push channel.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/webrtc/offer", post(signaling::offer))
            .route("/ws", get(ws::dashboard))
            .with_state(self)
    }

    /// Tear down a peer session.
    ///
    /// Idempotent: removing an unknown or already-removed peer is a no-op.
    /// A successful removal closes the transport best-effort and publishes
    /// exactly one `left` event.
    pub async fn remove_peer(&self, peer_id: &str) {
        let Some(mut peer) = self.registry.remove_and_return(peer_id).await else {
            return;
        };
        if let Err(e) = peer.transport().close().await {
            debug!(peer_id, error = %e, "peer transport close failed");
        }
        peer.mark_closed();
        info!(peer_id, "peer removed");
        self.hub
            .publish(&HubEvent::Left {
                peer_id: peer_id.to_string(),
            })
            .await;
    }

    /// Drop a peer whose negotiation never completed. No `left` event:
    /// the peer was never announced to observers.
    pub(crate) async fn discard_peer(&self, peer_id: &str) {
        let Some(mut peer) = self.registry.remove_and_return(peer_id).await else {
            return;
        };
        if let Err(e) = peer.transport().close().await {
            debug!(peer_id, error = %e, "peer transport close failed");
        }
        peer.mark_closed();
    }

    /// Graceful shutdown, triggered once.
    ///
    /// Closes every peer transport and clears the registry, drops every
    /// dashboard subscriber, then cancels and joins all tracked tasks.
    /// After it returns no connection is open and no task is orphaned.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("relay shutting down");

        for mut peer in self.registry.drain().await {
            if let Err(e) = peer.transport().close().await {
                debug!(peer_id = peer.id(), error = %e, "transport close failed during shutdown");
            }
            peer.mark_closed();
        }
        self.hub.drain().await;
        self.tasks.drain().await;

        info!("relay shut down, all tasks terminal");
    }
}
