//! Chat Crypto - End-to-End Encryption for PairUp Chat
//!
//! X25519 key agreement, HKDF-SHA256 key derivation and AES-256-GCM
//! (or ChaCha20Poly1305) authenticated encryption. Public keys, ciphertext
//! and nonces cross the process boundary as lowercase hex.
//!
//! ```text
//! IdentityManager ──► diffie_hellman ──► derive_symmetric_key ──► AEAD ──► hex
//!   (KeyPair)          (SharedSecret)      (SymmetricKey)
//! ```

mod cipher;
mod config;
mod encoding;
mod error;
mod exchange;
mod identity;
mod kdf;
mod session;

pub use chat_protocol::EncryptedMessage;
pub use cipher::*;
pub use config::*;
pub use encoding::*;
pub use error::*;
pub use exchange::*;
pub use identity::*;
pub use kdf::*;
pub use session::*;

/// Nonce size for AES-GCM and ChaCha20Poly1305 (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Public key size (256 bits / 32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Shared secret size (256 bits / 32 bytes)
pub const SHARED_SECRET_SIZE: usize = 32;

/// Symmetric key size (256 bits / 32 bytes)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// HKDF info label. Changing it breaks interoperability with existing peers.
pub const KDF_INFO: &[u8] = b"Chat-App-Key-Derivation";

/// Default number of peer secrets kept in the cache
pub const DEFAULT_SECRET_CACHE_CAPACITY: usize = 1024;
