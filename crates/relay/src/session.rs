//! Per-peer session event loop.
//!
//! WebRTC callbacks do no work of their own: each one forwards a
//! [`PeerEvent`] into the peer's channel, and a single tracked task per
//! peer consumes the channel and drives the state transitions. This keeps
//! the session logic in one place instead of scattered across closures.

use crate::events::HubEvent;
use crate::telemetry;
use crate::transport::PeerChannel;
use crate::RelayApp;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::RTCPeerConnection;

/// One event delivered to a peer's session loop.
pub enum PeerEvent {
    /// The sender's data channel opened
    ChannelOpen(Arc<dyn PeerChannel>),
    /// Binary telemetry frame
    Binary(Bytes),
    /// Text control message
    Text(String),
    /// The data channel closed
    ChannelClosed,
    /// ICE connection state changed
    ConnectionState(RTCIceConnectionState),
}

/// Attach the forwarding callbacks to a freshly created peer connection
/// and spawn the session loop for it.
pub fn wire_peer_connection(app: &Arc<RelayApp>, peer_id: &str, pc: &RTCPeerConnection) {
    let (tx, rx) = mpsc::unbounded_channel();

    let expected_label = app.config().channel_label.clone();
    let dc_tx = tx.clone();
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        if dc.label() != expected_label {
            warn!(
                channel = dc.label(),
                expected = %expected_label,
                "unexpected data channel label"
            );
        }

        let open_tx = dc_tx.clone();
        let open_dc = Arc::clone(&dc);
        dc.on_open(Box::new(move || {
            let channel: Arc<dyn PeerChannel> = open_dc.clone();
            let _ = open_tx.send(PeerEvent::ChannelOpen(channel));
            Box::pin(async {})
        }));

        let msg_tx = dc_tx.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let event = if msg.is_string {
                PeerEvent::Text(String::from_utf8_lossy(&msg.data).into_owned())
            } else {
                PeerEvent::Binary(msg.data.clone())
            };
            let _ = msg_tx.send(event);
            Box::pin(async {})
        }));

        let close_tx = dc_tx.clone();
        dc.on_close(Box::new(move || {
            let _ = close_tx.send(PeerEvent::ChannelClosed);
            Box::pin(async {})
        }));

        Box::pin(async {})
    }));

    let ice_tx = tx;
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        let _ = ice_tx.send(PeerEvent::ConnectionState(state));
        Box::pin(async {})
    }));

    let loop_app = Arc::clone(app);
    let loop_peer_id = peer_id.to_string();
    app.tasks
        .spawn(async move { run_peer_loop(loop_app, loop_peer_id, rx).await });
}

/// Consume a peer's events until the session ends or shutdown cancels it.
pub async fn run_peer_loop(
    app: Arc<RelayApp>,
    peer_id: String,
    mut events: mpsc::UnboundedReceiver<PeerEvent>,
) {
    loop {
        let event = tokio::select! {
            _ = app.tasks.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if !handle_event(&app, &peer_id, event).await {
            break;
        }
    }
    trace!(peer_id, "peer event loop ended");
}

/// Apply one event. Returns false when the session is over.
async fn handle_event(app: &Arc<RelayApp>, peer_id: &str, event: PeerEvent) -> bool {
    match event {
        PeerEvent::ChannelOpen(channel) => {
            app.registry.set_channel(peer_id, channel).await;
            true
        }
        PeerEvent::Binary(data) => {
            let Some((count, label)) = app.registry.record_sample(peer_id).await else {
                return true;
            };
            let frame = telemetry::decode(&data);
            publish_later(
                app,
                HubEvent::Sample {
                    peer_id: peer_id.to_string(),
                    label,
                    count,
                    frame,
                },
            );
            true
        }
        PeerEvent::Text(text) => {
            let label = app.registry.label(peer_id).await.flatten();
            let fields = match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    let mut map = Map::new();
                    map.insert("text".to_string(), Value::String(text));
                    map
                }
            };
            publish_later(app, HubEvent::control(fields, peer_id, label.as_deref()));
            true
        }
        PeerEvent::ChannelClosed => {
            app.remove_peer(peer_id).await;
            false
        }
        PeerEvent::ConnectionState(state) => {
            publish_later(
                app,
                HubEvent::Ice {
                    peer_id: peer_id.to_string(),
                    state: state.to_string(),
                },
            );
            match state {
                RTCIceConnectionState::Failed
                | RTCIceConnectionState::Closed
                | RTCIceConnectionState::Disconnected => {
                    app.remove_peer(peer_id).await;
                    false
                }
                _ => true,
            }
        }
    }
}

/// Hand delivery off as its own tracked unit of work so slow subscriber
/// I/O never stalls the decode path.
fn publish_later(app: &Arc<RelayApp>, event: HubEvent) {
    let worker = Arc::clone(app);
    app.tasks.spawn(async move { worker.hub.publish(&event).await });
}
