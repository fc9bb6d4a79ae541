//! Symmetric key derivation (HKDF-SHA256)

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, CryptoResult, KDF_INFO, SYMMETRIC_KEY_SIZE, SharedSecret};

/// 256-bit key for the authenticated cipher
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Raw key bytes. Never log or transmit these.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Derive the message key from a shared secret
///
/// HKDF-SHA256 with an empty salt and [`KDF_INFO`] as the info label.
/// Deterministic: the same secret always yields the same key.
pub fn derive_symmetric_key(shared_secret: &SharedSecret) -> CryptoResult<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
    let mut okm = [0u8; SYMMETRIC_KEY_SIZE];
    hkdf.expand(KDF_INFO, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = SymmetricKey(okm);
    okm.zeroize();
    Ok(key)
}
