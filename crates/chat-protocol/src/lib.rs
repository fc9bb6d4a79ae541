//! Shared Protocol Definitions for PairUp Chat
//!
//! This crate contains the wire types exchanged between chat peers and the
//! relay. The relay is untrusted: every message body it sees is an
//! [`EncryptedMessage`] whose fields are opaque hex strings.

mod error;
mod message;
mod peer;
mod relay;

pub use error::*;
pub use message::*;
pub use peer::*;
pub use relay::*;

/// Separator used when joining two peer ids into a room id
pub const ROOM_SEPARATOR: char = '_';
