//! A chat participant: owns a crypto session and a relay connection

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use chat_crypto::{CryptoConfig, CryptoSession, SharedSecret};
use chat_protocol::{ChatMessage, KeyAnnouncement, MessageId, PeerId, ReadReceipt, RelayMessage};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::relay::{Connection, Relay};

/// How long to wait for the relay before giving up
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Something the conversation UI would render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyEvent {
    KeyExchanged(PeerId),
    KeyRejected { from: PeerId, reason: String },
    Message { from: PeerId, text: String },
    Undecryptable { from: PeerId, id: MessageId },
    Online(Vec<PeerId>),
    RelayError(String),
}

pub struct Party {
    id: PeerId,
    crypto: Arc<CryptoSession>,
    conn: Connection,
    secrets: HashMap<PeerId, SharedSecret>,
}

impl Party {
    /// Create the identity and connect to the relay
    ///
    /// Key-pair generation failure aborts chat startup.
    pub fn connect(relay: &Relay, id: PeerId, config: CryptoConfig) -> anyhow::Result<Self> {
        let crypto = match CryptoSession::initialized(config) {
            Ok(crypto) => crypto,
            Err(e) if e.is_fatal() => {
                error!("{}: secure chat unavailable: {}", id, e);
                return Err(e).with_context(|| format!("failed to initialize identity for {id}"));
            }
            Err(e) => return Err(e).context("invalid crypto configuration"),
        };
        info!("{} ready, cipher suite {}", id, crypto.cipher_suite());
        let conn = relay.connect(id.clone());
        Ok(Self {
            id,
            crypto: Arc::new(crypto),
            conn,
            secrets: HashMap::new(),
        })
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Join the room with `peer` and publish our public key
    pub async fn open_conversation(&self, peer: &PeerId) -> anyhow::Result<()> {
        self.send(RelayMessage::JoinRoom {
            peer: self.id.clone(),
            with: peer.clone(),
        })
        .await?;
        self.send(RelayMessage::AnnounceKey(KeyAnnouncement {
            peer: self.id.clone(),
            public_key_hex: self.crypto.public_key_hex()?,
        }))
        .await
    }

    /// Encrypt and send a message; requires a completed key exchange
    pub async fn send_text(&self, to: &PeerId, text: &str) -> anyhow::Result<()> {
        let Some(secret) = self.secrets.get(to) else {
            bail!("no key exchanged with {to}");
        };
        let payload = self.crypto.encrypt_message(secret, text)?;
        let chat = ChatMessage::new(self.id.clone(), to.clone(), payload, now_ms());
        debug!("{} sending {} to {}", self.id, chat.id, to);
        self.send(RelayMessage::Send(chat)).await
    }

    pub async fn mark_read(&self, chat_with: &PeerId) -> anyhow::Result<()> {
        self.send(RelayMessage::ReadReceipt(ReadReceipt {
            user: self.id.clone(),
            chat_with: chat_with.clone(),
            last_read_ms: now_ms(),
        }))
        .await
    }

    /// Wait for the next event worth surfacing
    pub async fn next_event(&mut self) -> anyhow::Result<PartyEvent> {
        loop {
            let msg = timeout(RECV_TIMEOUT, self.conn.rx.recv())
                .await
                .context("timed out waiting for relay")?
                .context("relay closed the connection")?;

            match msg {
                RelayMessage::AnnounceKey(announcement) => {
                    if announcement.peer == self.id {
                        continue;
                    }
                    let from = announcement.peer;
                    match self.crypto.derive_shared_secret(&announcement.public_key_hex) {
                        Ok(secret) => {
                            info!("{} completed key exchange with {}", self.id, from);
                            self.secrets.insert(from.clone(), secret);
                            return Ok(PartyEvent::KeyExchanged(from));
                        }
                        Err(e) => {
                            warn!("{}: rejected key from {}: {}", self.id, from, e);
                            return Ok(PartyEvent::KeyRejected {
                                from,
                                reason: e.to_string(),
                            });
                        }
                    }
                }

                RelayMessage::Receive(chat) => return Ok(self.open(chat)),

                RelayMessage::OnlineUsers(peers) => return Ok(PartyEvent::Online(peers)),

                RelayMessage::Error { message } => return Ok(PartyEvent::RelayError(message)),

                _ => continue,
            }
        }
    }

    /// Wait until the key exchange with `peer` completes
    pub async fn await_key_exchange(&mut self, peer: &PeerId) -> anyhow::Result<()> {
        while !self.secrets.contains_key(peer) {
            if let PartyEvent::RelayError(message) = self.next_event().await? {
                bail!("relay error: {message}");
            }
        }
        Ok(())
    }

    /// Wait for the next chat message, readable or not
    pub async fn next_message(&mut self) -> anyhow::Result<PartyEvent> {
        loop {
            match self.next_event().await? {
                event @ (PartyEvent::Message { .. } | PartyEvent::Undecryptable { .. }) => {
                    return Ok(event);
                }
                PartyEvent::RelayError(message) => bail!("relay error: {message}"),
                _ => continue,
            }
        }
    }

    fn open(&self, chat: ChatMessage) -> PartyEvent {
        let Some(secret) = self.secrets.get(&chat.sender) else {
            warn!("{}: message {} from {} before key exchange", self.id, chat.id, chat.sender);
            return PartyEvent::Undecryptable {
                from: chat.sender,
                id: chat.id,
            };
        };

        match self.crypto.decrypt(secret, &chat.payload) {
            Ok(text) => PartyEvent::Message {
                from: chat.sender,
                text,
            },
            Err(e) => {
                if e.is_undecryptable() {
                    warn!("{}: message undecryptable ({}): {}", self.id, chat.id, e);
                } else {
                    warn!("{}: unexpected crypto error on {}: {}", self.id, chat.id, e);
                }
                PartyEvent::Undecryptable {
                    from: chat.sender,
                    id: chat.id,
                }
            }
        }
    }

    async fn send(&self, msg: RelayMessage) -> anyhow::Result<()> {
        self.conn
            .tx
            .send(msg)
            .await
            .map_err(|_| anyhow::anyhow!("relay connection closed"))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
