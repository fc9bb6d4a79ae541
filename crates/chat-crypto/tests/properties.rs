//! Property-based tests for the encryption core
//!
//! 1. **Round-trip**: decrypt(encrypt(m)) == m for every UTF-8 string
//! 2. **Symmetry**: both parties derive the same shared secret
//! 3. **Determinism**: same inputs always produce the same secret and key

use chat_crypto::{CipherSuite, CryptoConfig, CryptoSession, SharedSecret, derive_symmetric_key};
use proptest::prelude::*;

fn pair(suite: CipherSuite) -> (CryptoSession, CryptoSession) {
    let config = CryptoConfig {
        cipher_suite: suite,
        ..Default::default()
    };
    (
        CryptoSession::initialized(config.clone()).unwrap(),
        CryptoSession::initialized(config).unwrap(),
    )
}

fn suite() -> impl Strategy<Value = CipherSuite> {
    prop_oneof![
        Just(CipherSuite::Aes256Gcm),
        Just(CipherSuite::ChaCha20Poly1305),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip(message in any::<String>(), suite in suite()) {
        let (alice, bob) = pair(suite);
        let secret_a = alice.derive_shared_secret(&bob.public_key_hex().unwrap()).unwrap();
        let secret_b = bob.derive_shared_secret(&alice.public_key_hex().unwrap()).unwrap();

        let encrypted = alice.encrypt_message(&secret_a, &message).unwrap();
        let decrypted = bob
            .decrypt_message(&secret_b, &encrypted.ciphertext, &encrypted.nonce)
            .unwrap();

        prop_assert_eq!(decrypted, message);
    }

    #[test]
    fn prop_shared_secret_symmetry(_seed in any::<u8>()) {
        let (alice, bob) = pair(CipherSuite::Aes256Gcm);
        let ab = alice.derive_shared_secret_uncached(&bob.public_key_hex().unwrap()).unwrap();
        let ba = bob.derive_shared_secret_uncached(&alice.public_key_hex().unwrap()).unwrap();

        prop_assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn prop_symmetric_key_deterministic(secret in any::<[u8; 32]>()) {
        let a = derive_symmetric_key(&SharedSecret::from_bytes(secret)).unwrap();
        let b = derive_symmetric_key(&SharedSecret::from_bytes(secret)).unwrap();

        prop_assert_eq!(a.as_bytes(), b.as_bytes());
        prop_assert_ne!(a.as_bytes(), &secret);
    }

    #[test]
    fn prop_ciphertext_length(message in ".{0,256}") {
        let (alice, bob) = pair(CipherSuite::Aes256Gcm);
        let secret = alice.derive_shared_secret(&bob.public_key_hex().unwrap()).unwrap();
        let encrypted = alice.encrypt_message(&secret, &message).unwrap();

        prop_assert_eq!(encrypted.ciphertext.len(), (message.len() + chat_crypto::TAG_SIZE) * 2);
        prop_assert_eq!(encrypted.nonce.len(), chat_crypto::NONCE_SIZE * 2);
    }
}
