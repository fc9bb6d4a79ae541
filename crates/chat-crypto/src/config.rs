//! Crypto configuration

use serde::{Deserialize, Serialize};

use crate::{CipherSuite, CryptoError, CryptoResult, DEFAULT_SECRET_CACHE_CAPACITY};

/// Crypto session configuration
///
/// The HKDF label and nonce size are crate constants, not configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Message AEAD; both peers must use the same suite
    pub cipher_suite: CipherSuite,
    /// Maximum number of peer secrets kept in memory
    pub secret_cache_capacity: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cipher_suite: CipherSuite::Aes256Gcm,
            secret_cache_capacity: DEFAULT_SECRET_CACHE_CAPACITY,
        }
    }
}

impl CryptoConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(text: &str) -> CryptoResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| CryptoError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.secret_cache_capacity == 0 {
            return Err(CryptoError::InvalidConfig(
                "secret_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CryptoConfig::default();
        assert_eq!(config.cipher_suite, CipherSuite::Aes256Gcm);
        assert_eq!(config.secret_cache_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"cipher_suite": "chacha20-poly1305"}"#;
        let config = CryptoConfig::from_json_str(json).unwrap();
        assert_eq!(config.cipher_suite, CipherSuite::ChaCha20Poly1305);
        assert_eq!(config.secret_cache_capacity, DEFAULT_SECRET_CACHE_CAPACITY);

        assert_eq!(CryptoConfig::from_json_str("{}").unwrap(), CryptoConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            CryptoConfig::from_json_str(r#"{"secret_cache_capacity": 0}"#),
            Err(CryptoError::InvalidConfig(_))
        ));
        assert!(matches!(
            CryptoConfig::from_json_str(r#"{"cipher_suite": "rot13"}"#),
            Err(CryptoError::InvalidConfig(_))
        ));
    }
}
