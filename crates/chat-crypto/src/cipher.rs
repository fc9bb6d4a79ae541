//! Authenticated message encryption

use aes_gcm::Aes256Gcm;
use aes_gcm::aead::{Aead, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use chat_protocol::EncryptedMessage;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    CryptoError, CryptoResult, NONCE_SIZE, SharedSecret, SymmetricKey, TAG_SIZE,
    derive_symmetric_key, from_hex, from_hex_array, to_hex,
};

/// AEAD used for message bodies
///
/// Both take a 256-bit key and a 96-bit nonce and append a 128-bit tag.
/// Peers must agree on the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CipherSuite {
    /// AES-256-GCM, wire-compatible with existing web clients
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl CipherSuite {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    fn seal(&self, key: &SymmetricKey, nonce: &Nonce, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let result = match self {
            Self::Aes256Gcm => Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))?
                .encrypt(aes_gcm::Nonce::from_slice(&nonce.0), plaintext),
            Self::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))?
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), plaintext),
        };
        result.map_err(|e| CryptoError::EncryptionFailure(e.to_string()))
    }

    fn open(&self, key: &SymmetricKey, nonce: &Nonce, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let result = match self {
            Self::Aes256Gcm => Aes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|_| CryptoError::DecryptionFailure)?
                .decrypt(aes_gcm::Nonce::from_slice(&nonce.0), ciphertext),
            Self::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|_| CryptoError::DecryptionFailure)?
                .decrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), ciphertext),
        };
        result.map_err(|_| CryptoError::DecryptionFailure)
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 96-bit AEAD nonce
///
/// Must never repeat under the same key. Nonces are drawn uniformly at random
/// from the OS for every message, which keeps the collision probability
/// negligible well past 2^32 messages per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Fresh random nonce; fails if the OS random source is unavailable
    pub fn random() -> CryptoResult<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            CryptoError::EncryptionFailure(format!("secure randomness unavailable: {e}"))
        })?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Encrypt one message under a shared secret
///
/// The plaintext is never logged or returned on failure.
pub fn encrypt_message(
    suite: CipherSuite,
    shared_secret: &SharedSecret,
    plaintext: &str,
) -> CryptoResult<EncryptedMessage> {
    let key = derive_symmetric_key(shared_secret)
        .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))?;
    let nonce = Nonce::random()?;

    let ciphertext = suite.seal(&key, &nonce, plaintext.as_bytes())?;
    trace!(suite = %suite, len = ciphertext.len(), "Encrypted message");

    Ok(EncryptedMessage {
        ciphertext: to_hex(&ciphertext),
        nonce: to_hex(nonce.as_bytes()),
    })
}

/// Decrypt and verify one message
///
/// Fails with [`CryptoError::DecryptionFailure`] on any tag mismatch; no
/// unverified plaintext is ever returned.
pub fn decrypt_message(
    suite: CipherSuite,
    shared_secret: &SharedSecret,
    ciphertext_hex: &str,
    nonce_hex: &str,
) -> CryptoResult<String> {
    let ciphertext = from_hex(ciphertext_hex)
        .map_err(|e| CryptoError::MalformedInput(format!("ciphertext: {e}")))?;
    let nonce = from_hex_array::<NONCE_SIZE>(nonce_hex)
        .map(Nonce::from_bytes)
        .map_err(|e| CryptoError::MalformedInput(format!("nonce: {e}")))?;

    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailure);
    }

    let key = derive_symmetric_key(shared_secret).map_err(|_| CryptoError::DecryptionFailure)?;
    let plaintext = suite.open(&key, &nonce, &ciphertext)?;
    trace!(suite = %suite, len = plaintext.len(), "Decrypted message");

    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::InvalidPlaintext(e.utf8_error().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> SharedSecret {
        SharedSecret::from_bytes([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_basic() {
        for suite in [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305] {
            let msg = encrypt_message(suite, &secret(1), "hello bob").unwrap();
            let plain = decrypt_message(suite, &secret(1), &msg.ciphertext, &msg.nonce).unwrap();
            assert_eq!(plain, "hello bob");
        }
    }

    #[test]
    fn test_wire_format() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "hi").unwrap();

        assert_eq!(msg.nonce.len(), NONCE_SIZE * 2);
        assert_eq!(msg.ciphertext.len(), (2 + TAG_SIZE) * 2);
        assert_eq!(msg.ciphertext, msg.ciphertext.to_lowercase());
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "").unwrap();
        assert_eq!(msg.ciphertext.len(), TAG_SIZE * 2);

        let plain =
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), &msg.ciphertext, &msg.nonce);
        assert_eq!(plain.unwrap(), "");
    }

    #[test]
    fn test_malformed_hex_is_malformed_input() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "hi").unwrap();

        let odd = &msg.ciphertext[1..];
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), odd, &msg.nonce),
            Err(CryptoError::MalformedInput(_))
        ));
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), &msg.ciphertext, "not-hex"),
            Err(CryptoError::MalformedInput(_))
        ));
        // Valid hex, wrong nonce length
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), &msg.ciphertext, "00ff"),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails_authentication() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "hello").unwrap();
        let truncated = &msg.ciphertext[..msg.ciphertext.len() - 2];
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), truncated, &msg.nonce),
            Err(CryptoError::DecryptionFailure)
        ));
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), "", &msg.nonce),
            Err(CryptoError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_suite_mismatch_fails() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "hello").unwrap();
        let suite = CipherSuite::ChaCha20Poly1305;
        assert!(matches!(
            decrypt_message(suite, &secret(1), &msg.ciphertext, &msg.nonce),
            Err(CryptoError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_authenticated_invalid_utf8_is_reported() {
        let key = derive_symmetric_key(&secret(1)).unwrap();
        let nonce = Nonce::from_bytes([0; NONCE_SIZE]);
        let sealed = CipherSuite::Aes256Gcm.seal(&key, &nonce, &[0xff, 0xfe]).unwrap();

        let nonce_hex = to_hex(nonce.as_bytes());
        assert!(matches!(
            decrypt_message(CipherSuite::Aes256Gcm, &secret(1), &to_hex(&sealed), &nonce_hex),
            Err(CryptoError::InvalidPlaintext(_))
        ));
    }

    #[test]
    fn test_suite_serde_names() {
        assert_eq!(
            serde_json::to_string(&CipherSuite::ChaCha20Poly1305).unwrap(),
            "\"chacha20-poly1305\""
        );
        assert_eq!(
            serde_json::from_str::<CipherSuite>("\"aes-256-gcm\"").unwrap(),
            CipherSuite::Aes256Gcm
        );
    }

    #[test]
    fn test_known_answer_aes_gcm() {
        // Produced by a web client holding the same shared secret, zero nonce
        let plain = decrypt_message(
            CipherSuite::default(),
            &secret(0x2a),
            "2c83424d1c06f805ce46799a13b1e8dadbaf30fe2468052c29",
            "000000000000000000000000",
        )
        .unwrap();
        assert_eq!(plain, "hello bob");
    }

    #[test]
    fn test_decrypt_errors_stay_in_taxonomy() {
        let msg = encrypt_message(CipherSuite::Aes256Gcm, &secret(1), "hello").unwrap();
        let cases = [
            (msg.ciphertext.clone(), "zz".to_string()),
            ("0g".to_string(), msg.nonce.clone()),
            ("00".repeat(TAG_SIZE - 1), msg.nonce.clone()),
            (msg.ciphertext.clone(), "00".repeat(NONCE_SIZE)),
        ];

        for (ciphertext, nonce) in &cases {
            let err = decrypt_message(CipherSuite::Aes256Gcm, &secret(2), ciphertext, nonce)
                .unwrap_err();
            assert!(err.is_undecryptable(), "unexpected error: {err:?}");
            assert!(!matches!(err, CryptoError::KeyDerivation(_)));
        }
    }
}
