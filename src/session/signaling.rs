//! Signaling protocol
//!
//! JSON messages exchanged with the signaling server over the
//! WebSocket. A closed tagged enum decoded once at the boundary;
//! unknown `type` values fail decoding and are rejected by the caller.

use super::SessionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Client tag out on socket open; server echoes the assigned
    /// identity back.
    Login { user_id: String },

    /// Heartbeat probe with a millisecond timestamp.
    Ping { ts: u64 },

    /// Heartbeat acknowledgement.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },

    /// Join a transmission; the token combines id and password as
    /// `"<id>@<password>"`.
    JoinTransmission {
        user_id: String,
        transmission_id: String,
    },

    /// Leave the joined transmission.
    LeaveTransmission {
        user_id: String,
        transmission_id: String,
    },

    /// SDP offer from the remote host (this client answers).
    Offer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transmission_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_user_id: Option<String>,
    },

    /// SDP answer envelope sent back after ICE gathering completes.
    Answer {
        transmission_id: String,
        user_id: String,
        remote_user_id: String,
        sdp: String,
    },

    /// Trickled ICE candidate, both directions.
    NewCandidateMid {
        transmission_id: String,
        user_id: String,
        remote_user_id: String,
        candidate: String,
        #[serde(default)]
        mid: Option<String>,
    },
}

impl SignalMessage {
    /// Parse a signaling message from JSON.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json)
            .map_err(|e| SessionError::Signaling(format!("invalid signaling message: {}", e)))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self)
            .map_err(|e| SessionError::Signaling(format!("failed to serialize message: {}", e)))
    }
}
