//! Messages exchanged with the relay

use serde::{Deserialize, Serialize};

use crate::{ChatMessage, KeyAnnouncement, PeerId, ProtocolResult, ReadReceipt};

/// Relay events, in both directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMessage {
    /// Join the room shared with another peer
    JoinRoom { peer: PeerId, with: PeerId },
    /// Publish our public key to the room
    AnnounceKey(KeyAnnouncement),
    /// Outgoing chat message
    Send(ChatMessage),
    /// Chat message delivered to a room member
    Receive(ChatMessage),
    /// Read receipt update
    ReadReceipt(ReadReceipt),
    /// Current set of connected peers
    OnlineUsers(Vec<PeerId>),
    /// Error from the relay
    Error { message: String },
}

impl RelayMessage {
    /// Serialize to JSON text
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON text
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
