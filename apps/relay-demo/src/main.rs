//! PairUp Relay Demo
//!
//! Two peers exchange public keys and end-to-end encrypted messages through
//! an in-memory relay that only ever sees hex ciphertext.

mod party;
mod relay;

use anyhow::Context;
use chat_crypto::CryptoConfig;
use chat_protocol::{PeerId, RoomId};
use tracing::{info, warn};

use crate::party::{Party, PartyEvent};
use crate::relay::Relay;

/// Path to an optional JSON crypto config
const CONFIG_ENV: &str = "PAIRUP_CRYPTO_CONFIG";

/// Set to 1 to corrupt the first message in transit
const TAMPER_ENV: &str = "RELAY_DEMO_TAMPER";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_demo=debug".parse()?)
                .add_directive("chat_crypto=debug".parse()?),
        )
        .init();

    info!("Starting PairUp relay demo");

    let config = load_config()?;
    info!("Cipher suite: {}", config.cipher_suite);

    let relay = Relay::new();
    if std::env::var(TAMPER_ENV).is_ok_and(|v| v == "1") {
        warn!("Relay will tamper with the first message");
        relay.tamper_next();
    }

    let outcome = run_scenario(&relay, config).await?;
    report("bob", &outcome.bob_received);
    report("alice", &outcome.alice_received);

    let stored = relay.history(&outcome.room);
    info!(
        "Relay view of {}:\n{}",
        outcome.room,
        serde_json::to_string_pretty(&stored)?
    );

    Ok(())
}

fn load_config() -> anyhow::Result<CryptoConfig> {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return Ok(CryptoConfig::default());
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read crypto config {path}"))?;
    CryptoConfig::from_json_str(&text).with_context(|| format!("invalid crypto config {path}"))
}

fn report(who: &str, event: &PartyEvent) {
    match event {
        PartyEvent::Message { from, text } => info!("{} received from {}: {:?}", who, from, text),
        PartyEvent::Undecryptable { from, id } => {
            warn!("{} could not decrypt {} from {}", who, id, from)
        }
        other => info!("{} saw {:?}", who, other),
    }
}

/// What each side ended up with
struct Outcome {
    room: RoomId,
    bob_received: PartyEvent,
    alice_received: PartyEvent,
}

/// Alice greets Bob, Bob replies
async fn run_scenario(relay: &Relay, config: CryptoConfig) -> anyhow::Result<Outcome> {
    let alice_id = PeerId::parse("alice@pairup.chat")?;
    let bob_id = PeerId::parse("bob@pairup.chat")?;
    let room = RoomId::for_pair(&alice_id, &bob_id)?;

    let mut alice = Party::connect(relay, alice_id.clone(), config.clone())?;
    let mut bob = Party::connect(relay, bob_id.clone(), config)?;

    alice.open_conversation(bob.id()).await?;
    bob.open_conversation(alice.id()).await?;

    alice.await_key_exchange(&bob_id).await?;
    bob.await_key_exchange(&alice_id).await?;

    alice.send_text(&bob_id, "hello bob").await?;
    let bob_received = bob.next_message().await?;
    bob.mark_read(&alice_id).await?;

    bob.send_text(&alice_id, "hello alice").await?;
    let alice_received = alice.next_message().await?;

    Ok(Outcome {
        room,
        bob_received,
        alice_received,
    })
}
