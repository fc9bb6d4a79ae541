//! Per-process crypto session: identity, peer secrets and message encryption

use chat_protocol::EncryptedMessage;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::identity::short_key;
use crate::{
    CipherSuite, CryptoConfig, CryptoResult, IdentityManager, SecretCache, SharedSecret, cipher,
    diffie_hellman, parse_peer_public_key,
};

/// Established cryptographic session
///
/// Owns the local identity and the peer secret cache. All methods take
/// `&self`; share it across tasks behind an `Arc`.
pub struct CryptoSession {
    config: CryptoConfig,
    identity: RwLock<IdentityManager>,
    secrets: SecretCache,
}

impl CryptoSession {
    /// Create an uninitialized session
    pub fn new(config: CryptoConfig) -> CryptoResult<Self> {
        config.validate()?;
        let secrets = SecretCache::new(config.secret_cache_capacity);
        Ok(Self {
            config,
            identity: RwLock::new(IdentityManager::new()),
            secrets,
        })
    }

    /// Create a session and generate its key pair
    pub fn initialized(config: CryptoConfig) -> CryptoResult<Self> {
        let session = Self::new(config)?;
        session.initialize()?;
        Ok(session)
    }

    /// Generate the local key pair
    ///
    /// A failure here is fatal to the chat feature: no secure messaging is
    /// possible without an identity.
    pub fn initialize(&self) -> CryptoResult<()> {
        let mut identity = self.identity.write();
        identity.initialize()?;
        self.secrets.reset(identity.generation());
        Ok(())
    }

    /// Replace the local key pair and drop every cached peer secret
    pub fn rotate_identity(&self) -> CryptoResult<()> {
        let mut identity = self.identity.write();
        identity.rotate()?;
        self.secrets.reset(identity.generation());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.identity.read().is_initialized()
    }

    /// Local public key as lowercase hex
    pub fn public_key_hex(&self) -> CryptoResult<String> {
        self.identity.read().public_key_hex()
    }

    /// Shared secret with a peer, cached by the peer's public key
    pub fn derive_shared_secret(&self, peer_public_key_hex: &str) -> CryptoResult<SharedSecret> {
        let identity = self.identity.read();
        let keypair = identity.keypair()?;

        if let Some(secret) = self.secrets.get(peer_public_key_hex) {
            trace!(peer = %short_key(peer_public_key_hex), "Shared secret cache hit");
            return Ok(secret);
        }

        let peer = parse_peer_public_key(peer_public_key_hex)?;
        let secret = diffie_hellman(keypair, &peer)?;
        self.secrets
            .insert(identity.generation(), peer_public_key_hex, secret.clone());

        debug!(
            peer = %short_key(peer_public_key_hex),
            cached = self.secrets.len(),
            "Derived shared secret"
        );
        Ok(secret)
    }

    /// Shared secret with a peer, bypassing the cache
    pub fn derive_shared_secret_uncached(
        &self,
        peer_public_key_hex: &str,
    ) -> CryptoResult<SharedSecret> {
        let identity = self.identity.read();
        let keypair = identity.keypair()?;
        let peer = parse_peer_public_key(peer_public_key_hex)?;
        diffie_hellman(keypair, &peer)
    }

    /// Encrypt a message for the peer behind `shared_secret`
    pub fn encrypt_message(
        &self,
        shared_secret: &SharedSecret,
        plaintext: &str,
    ) -> CryptoResult<EncryptedMessage> {
        cipher::encrypt_message(self.config.cipher_suite, shared_secret, plaintext)
    }

    /// Decrypt a message received from the peer behind `shared_secret`
    pub fn decrypt_message(
        &self,
        shared_secret: &SharedSecret,
        ciphertext_hex: &str,
        nonce_hex: &str,
    ) -> CryptoResult<String> {
        let suite = self.config.cipher_suite;
        cipher::decrypt_message(suite, shared_secret, ciphertext_hex, nonce_hex)
    }

    pub fn decrypt(
        &self,
        shared_secret: &SharedSecret,
        message: &EncryptedMessage,
    ) -> CryptoResult<String> {
        self.decrypt_message(shared_secret, &message.ciphertext, &message.nonce)
    }

    /// Number of peer secrets currently cached
    pub fn cached_secrets(&self) -> usize {
        self.secrets.len()
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.config.cipher_suite
    }
}

impl std::fmt::Debug for CryptoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSession")
            .field("config", &self.config)
            .field("identity", &*self.identity.read())
            .field("cached_secrets", &self.secrets.len())
            .finish()
    }
}
