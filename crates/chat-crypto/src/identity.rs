//! Local X25519 identity for the lifetime of a chat session

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, to_hex};

/// Long-lived key pair for key exchange
///
/// The private scalar is never serialized or exposed; it is zeroized on drop.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair from the OS random source
    ///
    /// Fails rather than falling back to a weaker source.
    pub fn generate() -> CryptoResult<Self> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let secret = StaticSecret::from(*seed);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    #[cfg(test)]
    pub(crate) fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key as lowercase hex
    pub fn public_key_hex(&self) -> String {
        to_hex(self.public.as_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Owner of the local identity
///
/// Starts uninitialized. Every successful `initialize` or `rotate` bumps the
/// generation, which callers use to invalidate anything derived from the
/// previous key pair.
#[derive(Debug, Default)]
pub struct IdentityManager {
    keypair: Option<KeyPair>,
    generation: u64,
}

impl IdentityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the session key pair
    ///
    /// Calling this again replaces the existing key pair, same as [`rotate`].
    ///
    /// [`rotate`]: IdentityManager::rotate
    pub fn initialize(&mut self) -> CryptoResult<()> {
        let keypair = KeyPair::generate()?;
        self.generation += 1;
        info!(
            generation = self.generation,
            public_key = %short_key(&keypair.public_key_hex()),
            "Identity initialized"
        );
        self.keypair = Some(keypair);
        Ok(())
    }

    /// Replace the key pair with a fresh one
    ///
    /// Requires a previous `initialize`. On failure the old key pair stays.
    pub fn rotate(&mut self) -> CryptoResult<()> {
        if self.keypair.is_none() {
            return Err(CryptoError::KeyPairUninitialized);
        }
        let keypair = KeyPair::generate()?;
        self.generation += 1;
        debug!(generation = self.generation, "Identity rotated");
        self.keypair = Some(keypair);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.keypair.is_some()
    }

    /// Identity generation; 0 until initialized
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Local public key as lowercase hex, for publication to a peer
    pub fn public_key_hex(&self) -> CryptoResult<String> {
        Ok(self.keypair()?.public_key_hex())
    }

    pub fn keypair(&self) -> CryptoResult<&KeyPair> {
        self.keypair.as_ref().ok_or(CryptoError::KeyPairUninitialized)
    }
}

/// First 8 hex characters of a key, for logs
pub(crate) fn short_key(hex: &str) -> &str {
    hex.get(..8).unwrap_or(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PUBLIC_KEY_SIZE;

    #[test]
    fn test_uninitialized_identity() {
        let identity = IdentityManager::new();
        assert!(!identity.is_initialized());
        assert_eq!(identity.generation(), 0);
        assert!(matches!(
            identity.public_key_hex(),
            Err(CryptoError::KeyPairUninitialized)
        ));
    }

    #[test]
    fn test_public_key_hex_format() {
        let mut identity = IdentityManager::new();
        identity.initialize().unwrap();

        let hex = identity.public_key_hex().unwrap();
        assert_eq!(hex.len(), PUBLIC_KEY_SIZE * 2);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // Stable between calls
        assert_eq!(hex, identity.public_key_hex().unwrap());
    }

    #[test]
    fn test_rotate_changes_key_and_generation() {
        let mut identity = IdentityManager::new();
        assert!(matches!(
            identity.rotate(),
            Err(CryptoError::KeyPairUninitialized)
        ));

        identity.initialize().unwrap();
        let before = identity.public_key_hex().unwrap();
        assert_eq!(identity.generation(), 1);

        identity.rotate().unwrap();
        assert_ne!(before, identity.public_key_hex().unwrap());
        assert_eq!(identity.generation(), 2);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let keypair = KeyPair::generate().unwrap();
        let rendered = format!("{keypair:?}");
        assert!(rendered.contains(&keypair.public_key_hex()));
        assert!(!rendered.contains("secret"));
    }
}
