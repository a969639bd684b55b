//! Transport seam between the registry and the WebRTC stack.
//!
//! The registry owns peer transports behind these traits so session and
//! shutdown logic can be exercised without a live peer connection.

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

/// The negotiated connection owned by a registry entry.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Close the transport. Callers treat failures as best-effort.
    async fn close(&self) -> Result<()>;
}

/// The negotiated data channel carried by a connected peer.
pub trait PeerChannel: Send + Sync {
    fn label(&self) -> &str;
}

/// [`PeerTransport`] over a real WebRTC peer connection.
pub struct RtcTransport {
    pc: Arc<RTCPeerConnection>,
}

impl RtcTransport {
    pub fn new(pc: Arc<RTCPeerConnection>) -> Self {
        Self { pc }
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn close(&self) -> Result<()> {
        self.pc
            .close()
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

impl PeerChannel for RTCDataChannel {
    fn label(&self) -> &str {
        RTCDataChannel::label(self)
    }
}
