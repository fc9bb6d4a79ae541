//! In-memory untrusted relay
//!
//! Routes key announcements and encrypted chat messages between peers that
//! share a room and keeps the room history. It only ever handles hex
//! ciphertext; it holds no keys.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_crypto::{from_hex, to_hex};
use chat_protocol::{ChatMessage, KeyAnnouncement, PeerId, RelayMessage, RoomId};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of each peer's inbound and outbound channel
const CHANNEL_CAPACITY: usize = 100;

/// Relay handle; clones share state
#[derive(Clone, Default)]
pub struct Relay {
    state: Arc<RelayState>,
}

#[derive(Default)]
struct RelayState {
    /// Connected peers: PeerId -> channel to send messages
    peers: DashMap<PeerId, mpsc::Sender<RelayMessage>>,
    /// Room members
    rooms: DashMap<RoomId, HashSet<PeerId>>,
    /// Latest public key announced by each peer
    keys: DashMap<PeerId, KeyAnnouncement>,
    /// Stored messages per room, in arrival order
    history: DashMap<RoomId, Vec<ChatMessage>>,
    /// Last read timestamp per (user, chat_with)
    receipts: DashMap<(PeerId, PeerId), u64>,
    /// Flip one ciphertext bit of the next routed message
    tamper_next: AtomicBool,
}

/// A peer's connection to the relay
pub struct Connection {
    pub tx: mpsc::Sender<RelayMessage>,
    pub rx: mpsc::Receiver<RelayMessage>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrupt the next chat message in transit
    pub fn tamper_next(&self) {
        self.state.tamper_next.store(true, Ordering::SeqCst);
    }

    /// Connect a peer; must be called inside a tokio runtime
    pub fn connect(&self, peer: PeerId) -> Connection {
        let (to_relay_tx, to_relay_rx) = mpsc::channel::<RelayMessage>(CHANNEL_CAPACITY);
        let (from_relay_tx, from_relay_rx) = mpsc::channel::<RelayMessage>(CHANNEL_CAPACITY);

        info!("Peer connected: {}", peer);
        self.state.peers.insert(peer.clone(), from_relay_tx);

        let relay = self.clone();
        tokio::spawn(async move {
            relay.broadcast_online().await;
            relay.handle_connection(peer, to_relay_rx).await;
        });

        Connection {
            tx: to_relay_tx,
            rx: from_relay_rx,
        }
    }

    /// Messages stored for a room
    pub fn history(&self, room: &RoomId) -> Vec<ChatMessage> {
        self.state
            .history
            .get(room)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn online(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.state.peers.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn last_read(&self, user: &PeerId, chat_with: &PeerId) -> Option<u64> {
        self.state
            .receipts
            .get(&(user.clone(), chat_with.clone()))
            .map(|r| *r)
    }

    async fn handle_connection(&self, peer: PeerId, mut rx: mpsc::Receiver<RelayMessage>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                RelayMessage::JoinRoom { peer: joiner, with } => {
                    if joiner != peer {
                        self.reply_error(&peer, "cannot join on behalf of another peer").await;
                        continue;
                    }
                    self.join_room(&peer, &with).await;
                }

                RelayMessage::AnnounceKey(announcement) => {
                    if announcement.peer != peer {
                        self.reply_error(&peer, "cannot announce a key for another peer").await;
                        continue;
                    }
                    self.announce_key(announcement).await;
                }

                RelayMessage::Send(chat) => {
                    if chat.sender != peer {
                        self.reply_error(&peer, "sender does not match connection").await;
                        continue;
                    }
                    self.route_message(chat).await;
                }

                RelayMessage::ReadReceipt(receipt) => {
                    if receipt.user != peer {
                        self.reply_error(&peer, "cannot mark messages read for another peer").await;
                        continue;
                    }
                    debug!(
                        "Read receipt: {} read {} up to {}",
                        receipt.user, receipt.chat_with, receipt.last_read_ms
                    );
                    self.state
                        .receipts
                        .insert((receipt.user, receipt.chat_with), receipt.last_read_ms);
                }

                _ => {
                    debug!("Unhandled message type");
                }
            }
        }

        // Cleanup on disconnect
        info!("Peer disconnected: {}", peer);
        self.state.peers.remove(&peer);
        self.broadcast_online().await;
    }

    async fn join_room(&self, peer: &PeerId, with: &PeerId) {
        let room = match RoomId::for_pair(peer, with) {
            Ok(room) => room,
            Err(e) => {
                warn!("Invalid join from {}: {}", peer, e);
                self.reply_error(peer, &e.to_string()).await;
                return;
            }
        };

        info!("{} joined room {}", peer, room);
        self.state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(peer.clone());

        // Late joiner: hand over the other side's key and any stored messages
        let existing_key = self.state.keys.get(with).map(|k| k.clone());
        if let Some(announcement) = existing_key {
            self.send_to(peer, RelayMessage::AnnounceKey(announcement)).await;
        }
        for chat in self.history(&room) {
            if &chat.receiver == peer {
                self.send_to(peer, RelayMessage::Receive(chat)).await;
            }
        }
    }

    async fn announce_key(&self, announcement: KeyAnnouncement) {
        let from = announcement.peer.clone();
        debug!(
            "Key announced by {}: {}…",
            from,
            announcement.public_key_hex.get(..8).unwrap_or_default()
        );
        self.state.keys.insert(from.clone(), announcement.clone());

        for member in self.room_partners(&from) {
            self.send_to(&member, RelayMessage::AnnounceKey(announcement.clone()))
                .await;
        }
    }

    async fn route_message(&self, mut chat: ChatMessage) {
        let room = match chat.room() {
            Ok(room) => room,
            Err(e) => {
                self.reply_error(&chat.sender, &e.to_string()).await;
                return;
            }
        };

        if self.state.tamper_next.swap(false, Ordering::SeqCst) {
            chat.payload.ciphertext = flip_first_bit(&chat.payload.ciphertext);
            warn!("Tampering with message {} in transit", chat.id);
        }

        debug!(
            "Routing {} in {}: {} hex chars, nonce {}",
            chat.id,
            room,
            chat.payload.ciphertext.len(),
            chat.payload.nonce
        );

        self.state
            .history
            .entry(room.clone())
            .or_default()
            .push(chat.clone());

        let receiver_joined = self
            .state
            .rooms
            .get(&room)
            .is_some_and(|members| members.contains(&chat.receiver));
        if receiver_joined {
            let receiver = chat.receiver.clone();
            self.send_to(&receiver, RelayMessage::Receive(chat)).await;
        } else {
            debug!("{} has not joined {}, message stored", chat.receiver, room);
        }
    }

    /// Peers sharing at least one room with `peer`
    fn room_partners(&self, peer: &PeerId) -> Vec<PeerId> {
        self.state
            .rooms
            .iter()
            .filter(|room| room.value().contains(peer))
            .flat_map(|room| {
                room.value()
                    .iter()
                    .filter(|p| *p != peer)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    async fn broadcast_online(&self) {
        let online = self.online();
        let targets: Vec<mpsc::Sender<RelayMessage>> =
            self.state.peers.iter().map(|p| p.value().clone()).collect();
        for tx in targets {
            let _ = tx.send(RelayMessage::OnlineUsers(online.clone())).await;
        }
    }

    async fn send_to(&self, peer: &PeerId, msg: RelayMessage) {
        // Clone the sender so no map guard is held across the await
        let tx = self.state.peers.get(peer).map(|p| p.value().clone());
        match tx {
            Some(tx) => {
                if tx.send(msg).await.is_err() {
                    debug!("Peer {} channel closed", peer);
                }
            }
            None => debug!("Peer {} offline, dropping message", peer),
        }
    }

    async fn reply_error(&self, peer: &PeerId, message: &str) {
        self.send_to(
            peer,
            RelayMessage::Error {
                message: message.to_string(),
            },
        )
        .await;
    }
}

/// Flip the lowest bit of the first ciphertext byte
fn flip_first_bit(ciphertext_hex: &str) -> String {
    match from_hex(ciphertext_hex) {
        Ok(mut bytes) if !bytes.is_empty() => {
            bytes[0] ^= 0x01;
            to_hex(&bytes)
        }
        _ => ciphertext_hex.to_string(),
    }
}
