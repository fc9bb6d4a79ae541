//! Chat payload definitions

use serde::{Deserialize, Serialize};

use crate::{MessageId, PeerId, ProtocolResult, RoomId};

/// Encrypted message body as it crosses the relay
///
/// Both fields are lowercase hex. They must be stored and forwarded together,
/// verbatim; re-encoding either one makes the message undecryptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// AEAD output: ciphertext followed by the 16-byte tag
    pub ciphertext: String,
    /// 96-bit nonce, fresh for every message
    pub nonce: String,
}

/// Public key published when joining a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAnnouncement {
    pub peer: PeerId,
    pub public_key_hex: String,
}

/// A single chat message routed by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: PeerId,
    pub receiver: PeerId,
    pub payload: EncryptedMessage,
    /// Milliseconds since the Unix epoch, set by the sender
    pub timestamp_ms: u64,
}

impl ChatMessage {
    pub fn new(
        sender: PeerId,
        receiver: PeerId,
        payload: EncryptedMessage,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            receiver,
            payload,
            timestamp_ms,
        }
    }

    /// Room this message belongs to
    pub fn room(&self) -> ProtocolResult<RoomId> {
        RoomId::for_pair(&self.sender, &self.receiver)
    }
}

/// Last message a user has read in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user: PeerId,
    pub chat_with: PeerId,
    pub last_read_ms: u64,
}
