//! Peer, room and message identifiers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ProtocolError, ProtocolResult, ROOM_SEPARATOR};

/// User handle of a chat participant (the matching layer uses email addresses)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Parse a peer handle, trimming surrounding whitespace
    pub fn parse(s: &str) -> ProtocolResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ProtocolError::InvalidPeerId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerId {
    type Error = ProtocolError;

    fn try_from(value: String) -> ProtocolResult<Self> {
        Self::parse(&value)
    }
}

impl From<PeerId> for String {
    fn from(peer: PeerId) -> Self {
        peer.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation room shared by exactly two peers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Room for a pair of peers
    ///
    /// Both sides compute the same id regardless of argument order.
    pub fn for_pair(a: &PeerId, b: &PeerId) -> ProtocolResult<Self> {
        if a == b {
            return Err(ProtocolError::SelfConversation);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self(format!("{first}{ROOM_SEPARATOR}{second}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique message identifier assigned by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_trims_and_validates() {
        let peer = PeerId::parse("  alice@example.com ").unwrap();
        assert_eq!(peer.as_str(), "alice@example.com");

        assert!(matches!(PeerId::parse("   "), Err(ProtocolError::InvalidPeerId)));
        assert!(matches!(
            PeerId::parse("alice bob"),
            Err(ProtocolError::InvalidPeerId)
        ));
    }

    #[test]
    fn test_room_id_is_order_independent() {
        let alice = PeerId::parse("alice@example.com").unwrap();
        let bob = PeerId::parse("bob@example.com").unwrap();

        let ab = RoomId::for_pair(&alice, &bob).unwrap();
        let ba = RoomId::for_pair(&bob, &alice).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.as_str(), "alice@example.com_bob@example.com");
    }

    #[test]
    fn test_room_with_self_rejected() {
        let alice = PeerId::parse("alice@example.com").unwrap();
        assert!(matches!(
            RoomId::for_pair(&alice, &alice),
            Err(ProtocolError::SelfConversation)
        ));
    }

    #[test]
    fn test_peer_id_deserialization_validates() {
        let ok: PeerId = serde_json::from_str("\"carol@example.com\"").unwrap();
        assert_eq!(ok.as_str(), "carol@example.com");

        assert!(serde_json::from_str::<PeerId>("\"\"").is_err());
    }
}
