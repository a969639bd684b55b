//! Peer session registry.
//!
//! Sole owner of [`Peer`] entries and their transport handles. All shared
//! mutation goes through one `RwLock`; fan-out code never reaches in here
//! directly, it only sees published events and snapshots.

use crate::events::PeerSummary;
use crate::transport::{PeerChannel, PeerTransport};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Peer session lifecycle.
///
/// `Closed` is terminal and reached exactly once, either through an
/// explicit channel close or a failed/closed/disconnected transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Offer accepted, answer sent, waiting for the data channel
    Negotiating,
    /// Data channel open, telemetry flowing
    Connected,
    /// Teardown in progress
    Closing,
    /// Terminal
    Closed,
}

/// One remote sensor source.
pub struct Peer {
    id: String,
    label: Option<String>,
    transport: Arc<dyn PeerTransport>,
    channel: Option<Arc<dyn PeerChannel>>,
    samples_received: u64,
    state: PeerState,
}

impl Peer {
    /// Create a peer in `Negotiating` state.
    pub fn new(id: String, label: Option<String>, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            id,
            label,
            transport,
            channel: None,
            samples_received: 0,
            state: PeerState::Negotiating,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn samples_received(&self) -> u64 {
        self.samples_received
    }

    pub fn transport(&self) -> &Arc<dyn PeerTransport> {
        &self.transport
    }

    /// Begin teardown. Returns false if the peer is already past `Closing`.
    pub fn begin_close(&mut self) -> bool {
        match self.state {
            PeerState::Closing | PeerState::Closed => false,
            _ => {
                self.state = PeerState::Closing;
                true
            }
        }
    }

    /// Mark the peer terminal.
    pub fn mark_closed(&mut self) {
        self.state = PeerState::Closed;
    }
}

/// Registry of active peer sessions, keyed by generated peer id.
pub struct PeerSessionRegistry {
    peers: RwLock<HashMap<String, Peer>>,
}

impl Default for PeerSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerSessionRegistry {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new peer. A peer id is registered at most once.
    pub async fn insert(&self, peer: Peer) -> Result<()> {
        let mut peers = self.peers.write().await;
        if peers.contains_key(peer.id()) {
            return Err(Error::DuplicatePeer(peer.id().to_string()));
        }
        debug!(peer_id = peer.id(), label = ?peer.label(), "peer registered");
        peers.insert(peer.id().to_string(), peer);
        Ok(())
    }

    /// Number of registered peers.
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Current state of a peer, if registered.
    pub async fn state(&self, peer_id: &str) -> Option<PeerState> {
        self.peers.read().await.get(peer_id).map(Peer::state)
    }

    /// Label of a peer, if registered.
    pub async fn label(&self, peer_id: &str) -> Option<Option<String>> {
        self.peers
            .read()
            .await
            .get(peer_id)
            .map(|p| p.label.clone())
    }

    /// Attach the negotiated data channel and move the peer to `Connected`.
    ///
    /// The channel is set exactly once; a second open on the same peer is
    /// ignored with a warning. Returns true when the transition happened.
    pub async fn set_channel(&self, peer_id: &str, channel: Arc<dyn PeerChannel>) -> bool {
        let mut peers = self.peers.write().await;
        let Some(peer) = peers.get_mut(peer_id) else {
            return false;
        };
        if peer.channel.is_some() {
            warn!(peer_id, "data channel already set, ignoring reopen");
            return false;
        }
        debug!(peer_id, channel = channel.label(), "peer connected");
        peer.channel = Some(channel);
        peer.state = PeerState::Connected;
        true
    }

    /// Count one received sample.
    ///
    /// Returns the new total and the peer's label, or `None` when the
    /// peer has been removed. Peers leave the map before any terminal
    /// transition, so presence here means the session is live. The
    /// counter never decreases.
    pub async fn record_sample(&self, peer_id: &str) -> Option<(u64, Option<String>)> {
        let mut peers = self.peers.write().await;
        let peer = peers.get_mut(peer_id)?;
        peer.samples_received += 1;
        Some((peer.samples_received, peer.label.clone()))
    }

    /// Consistent view of the current peers, ordered by peer id.
    ///
    /// Used only to seed newly subscribed dashboards.
    pub async fn snapshot(&self) -> Vec<PeerSummary> {
        let peers = self.peers.read().await;
        let mut summaries: Vec<PeerSummary> = peers
            .values()
            .map(|p| PeerSummary {
                peer_id: p.id.clone(),
                label: p.label.clone(),
                count: p.samples_received,
            })
            .collect();
        summaries.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        summaries
    }

    /// Remove a peer, returning its entry in `Closing` state.
    ///
    /// Idempotent: removing an unknown id is a no-op returning `None`.
    pub async fn remove_and_return(&self, peer_id: &str) -> Option<Peer> {
        let mut peer = self.peers.write().await.remove(peer_id)?;
        peer.begin_close();
        Some(peer)
    }

    /// Remove every peer, for shutdown.
    pub async fn drain(&self) -> Vec<Peer> {
        let mut peers = self.peers.write().await;
        peers
            .drain()
            .map(|(_, mut peer)| {
                peer.begin_close();
                peer
            })
            .collect()
    }
}
