//! X25519 key agreement and the per-peer shared-secret cache

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, trace};
use x25519_dalek::PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::short_key;
use crate::{
    CryptoError, CryptoResult, KeyPair, PUBLIC_KEY_SIZE, SHARED_SECRET_SIZE, from_hex_array,
};

/// Raw X25519 output shared by two peers
///
/// Only ever used as HKDF input keying material, never directly as a key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Decode and validate a peer public key received from the relay
pub fn parse_peer_public_key(peer_public_key_hex: &str) -> CryptoResult<PublicKey> {
    let bytes = from_hex_array::<PUBLIC_KEY_SIZE>(peer_public_key_hex).map_err(|e| {
        CryptoError::MalformedKey(format!(
            "expected {} hex characters: {e}",
            PUBLIC_KEY_SIZE * 2
        ))
    })?;
    Ok(PublicKey::from(bytes))
}

/// Perform Diffie-Hellman key exchange
///
/// Rejects low-order peer points, which would force an all-zero secret
/// regardless of our private key.
pub fn diffie_hellman(ours: &KeyPair, their_public: &PublicKey) -> CryptoResult<SharedSecret> {
    let shared = ours.secret().diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(CryptoError::MalformedKey(
            "peer key is a low-order point".to_string(),
        ));
    }
    Ok(SharedSecret(shared.to_bytes()))
}

/// Cache key for a peer: the public key in lowercase hex
pub(crate) fn normalize_key_hex(peer_public_key_hex: &str) -> String {
    peer_public_key_hex.to_ascii_lowercase()
}

/// Bounded, thread-safe map of peer public key to shared secret
///
/// Entries are stamped with the identity generation they were derived under.
/// After [`reset`](SecretCache::reset), inserts carrying an older generation
/// are dropped, so a derivation racing a rotation cannot repopulate the cache
/// with a secret from the retired key pair. Oldest entries are evicted first.
pub struct SecretCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    generation: u64,
    entries: HashMap<String, SharedSecret>,
    order: VecDeque<String>,
}

impl SecretCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                generation: 0,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, peer_public_key_hex: &str) -> Option<SharedSecret> {
        let key = normalize_key_hex(peer_public_key_hex);
        self.inner.lock().entries.get(&key).cloned()
    }

    /// Insert a secret derived under `generation`
    ///
    /// Returns false if the entry was discarded as stale.
    pub fn insert(
        &self,
        generation: u64,
        peer_public_key_hex: &str,
        secret: SharedSecret,
    ) -> bool {
        let key = normalize_key_hex(peer_public_key_hex);
        let mut inner = self.inner.lock();

        if inner.generation != generation {
            trace!(
                entry_generation = generation,
                cache_generation = inner.generation,
                "Discarding stale secret"
            );
            return false;
        }

        if inner.entries.insert(key.clone(), secret).is_none() {
            inner.order.push_back(key);
        }

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            debug!(peer = %short_key(&oldest), "Evicted cached secret");
        }
        true
    }

    /// Drop every entry and start accepting inserts for `generation`
    pub fn reset(&self, generation: u64) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        inner.generation = generation;
        debug!(generation, dropped, "Secret cache reset");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
