//! WebRTC signaling endpoint.
//!
//! `POST /webrtc/offer` takes the sender's offer, answers it, and
//! registers a peer session wired into the dashboard hub. The sender is
//! the offerer and creates the telemetry data channel; this side only
//! answers and listens.

use crate::config::IceMode;
use crate::registry::Peer;
use crate::session;
use crate::transport::RtcTransport;
use crate::{Error, RelayApp, Result};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

/// Label used when the sender does not name its device.
const DEFAULT_PEER_LABEL: &str = "unknown";

/// Offer payload from a sender.
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub ice: Option<IceMode>,
}

/// Answer returned to the sender.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub peer_id: String,
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
}

/// Axum handler for `POST /webrtc/offer`.
pub async fn offer(
    State(app): State<Arc<RelayApp>>,
    Json(request): Json<OfferRequest>,
) -> Result<Json<OfferResponse>> {
    accept_offer(app, request).await.map(Json)
}

/// Validate an offer, create and register the peer, and negotiate the
/// answer. On any negotiation failure the peer is torn back out of the
/// registry before the error reaches the caller.
pub async fn accept_offer(app: Arc<RelayApp>, request: OfferRequest) -> Result<OfferResponse> {
    if request.sdp.trim().is_empty() {
        return Err(Error::InvalidOffer("empty sdp".to_string()));
    }
    if request.sdp_type != "offer" {
        return Err(Error::InvalidOffer(format!(
            "expected type 'offer', got '{}'",
            request.sdp_type
        )));
    }
    let offer =
        RTCSessionDescription::offer(request.sdp).map_err(|e| Error::InvalidOffer(e.to_string()))?;

    let ice_mode = request.ice.unwrap_or(app.config().default_ice_mode);
    let rtc_config = RTCConfiguration {
        ice_servers: app.ice_servers(ice_mode),
        ..Default::default()
    };
    let pc = Arc::new(
        app.api()
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| Error::Negotiation(e.to_string()))?,
    );

    let peer_id = Uuid::new_v4().to_string();
    let label = request
        .label
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_PEER_LABEL.to_string());
    let peer = Peer::new(
        peer_id.clone(),
        Some(label),
        Arc::new(RtcTransport::new(Arc::clone(&pc))),
    );
    app.registry.insert(peer).await?;
    session::wire_peer_connection(&app, &peer_id, &pc);

    match negotiate(&pc, offer).await {
        Ok(answer) => {
            info!(peer_id, ?ice_mode, "answered sender offer");
            Ok(OfferResponse {
                peer_id,
                sdp: answer.sdp,
                sdp_type: answer.sdp_type.to_string(),
            })
        }
        Err(e) => {
            warn!(peer_id, error = %e, "negotiation failed, discarding peer");
            app.discard_peer(&peer_id).await;
            Err(e)
        }
    }
}

/// Offer/answer dance: apply the remote offer, answer, and wait for ICE
/// gathering so the returned SDP carries the full candidate set.
async fn negotiate(
    pc: &Arc<RTCPeerConnection>,
    offer: RTCSessionDescription,
) -> Result<RTCSessionDescription> {
    pc.set_remote_description(offer)
        .await
        .map_err(|e| Error::Negotiation(e.to_string()))?;
    let answer = pc
        .create_answer(None)
        .await
        .map_err(|e| Error::Negotiation(e.to_string()))?;
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(answer)
        .await
        .map_err(|e| Error::Negotiation(e.to_string()))?;
    let _ = gathered.recv().await;
    pc.local_description()
        .await
        .ok_or_else(|| Error::Negotiation("no local description after gathering".to_string()))
}
