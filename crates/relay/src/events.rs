//! Dashboard wire events.
//!
//! Every frame pushed to a dashboard socket is one of these, serialized as
//! JSON with a `kind` discriminator. The first frame after subscribe is
//! always `snapshot`; everything after follows publish order.

use crate::telemetry::TelemetryFrame;
use serde::Serialize;
use serde_json::{Map, Value};

/// One row of the snapshot sent to a freshly subscribed dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub peer_id: String,
    pub label: Option<String>,
    pub count: u64,
}

/// An event fanned out to every dashboard subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HubEvent {
    /// Current peer set, sent once when a dashboard subscribes
    Snapshot { peers: Vec<PeerSummary> },

    /// One decoded telemetry frame (fields null when the frame was malformed)
    #[serde(rename_all = "camelCase")]
    Sample {
        peer_id: String,
        label: Option<String>,
        count: u64,
        #[serde(flatten)]
        frame: TelemetryFrame,
    },

    /// ICE connection state change for a peer
    #[serde(rename_all = "camelCase")]
    Ice { peer_id: String, state: String },

    /// A peer session was torn down
    #[serde(rename_all = "camelCase")]
    Left { peer_id: String },

    /// Control message passthrough. The map already carries `kind`,
    /// `peerId` and `label`; it is serialized as-is, without the enum tag.
    Control(Map<String, Value>),
}

impl HubEvent {
    /// Build a control event from a client JSON object.
    ///
    /// Mirrors the sender contract: `kind` defaults to `"msg"`, `peerId` is
    /// always stamped by the relay, `label` defaults to the peer's label.
    pub fn control(mut fields: Map<String, Value>, peer_id: &str, label: Option<&str>) -> Self {
        fields
            .entry("kind")
            .or_insert_with(|| Value::String("msg".to_string()));
        fields.insert("peerId".to_string(), Value::String(peer_id.to_string()));
        fields.entry("label").or_insert_with(|| match label {
            Some(l) => Value::String(l.to_string()),
            None => Value::Null,
        });
        HubEvent::Control(fields)
    }

    /// Event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::Snapshot { .. } => "snapshot",
            HubEvent::Sample { .. } => "sample",
            HubEvent::Ice { .. } => "ice",
            HubEvent::Left { .. } => "left",
            HubEvent::Control(_) => "control",
        }
    }

    /// Serialize to the JSON text sent over the wire.
    ///
    /// Control events bypass the tagged representation: their `kind` comes
    /// from the client payload, not from the enum variant.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            HubEvent::Control(fields) => serde_json::to_string(fields),
            other => serde_json::to_string(other),
        }
    }
}
