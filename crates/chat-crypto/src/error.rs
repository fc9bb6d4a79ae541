//! Crypto error types

use thiserror::Error;

/// Cryptographic operation error
///
/// Messages never include plaintext or key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed public key: {0}")]
    MalformedKey(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailure,

    #[error("Key pair not initialized")]
    KeyPairUninitialized,

    #[error("Decrypted message is not valid UTF-8: {0}")]
    InvalidPlaintext(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CryptoError {
    /// No secure messaging is possible after this error; chat startup must abort
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyGeneration(_))
    }

    /// The message should be shown as undecryptable; the session continues
    pub fn is_undecryptable(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailure | Self::MalformedInput(_) | Self::InvalidPlaintext(_)
        )
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CryptoError::KeyGeneration("rng".into()).is_fatal());
        assert!(!CryptoError::DecryptionFailure.is_fatal());

        assert!(CryptoError::DecryptionFailure.is_undecryptable());
        assert!(CryptoError::MalformedInput("odd length".into()).is_undecryptable());
        assert!(!CryptoError::KeyPairUninitialized.is_undecryptable());
        assert!(!CryptoError::MalformedKey("short".into()).is_undecryptable());
    }
}
