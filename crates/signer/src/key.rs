//! RSA key types and loading.

use crate::error::{SignerError, SignerResult};
use folio_core::config::PrivateKeyConfig;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Key size for generated development keys.
const GENERATED_KEY_BITS: usize = 2048;

/// A private RSA key for URL signing.
pub struct SigningKey {
    inner: RsaPrivateKey,
}

impl SigningKey {
    /// Generate a new random key.
    ///
    /// **For development and testing only.** Production keys are
    /// provisioned alongside the CDN distribution.
    pub fn generate() -> SignerResult<Self> {
        let mut rng = rand_core::OsRng;
        let inner = RsaPrivateKey::new(&mut rng, GENERATED_KEY_BITS)
            .map_err(|e| SignerError::KeyGeneration(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from a PEM string, accepting PKCS#1 or PKCS#8 encodings.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        let inner = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SignerError::KeyParsing(format!("invalid RSA private key PEM: {e}")))?;
        Ok(Self { inner })
    }

    /// Load a key from its configured source.
    pub fn from_config(config: &PrivateKeyConfig) -> SignerResult<Self> {
        match config {
            PrivateKeyConfig::File { path } => {
                let pem = std::fs::read_to_string(path)?;
                Self::from_pem(&pem)
            }
            PrivateKeyConfig::Env { var } => {
                let pem = std::env::var(var).map_err(|_| {
                    SignerError::KeyParsing(format!("environment variable {var} not set"))
                })?;
                Self::from_pem(&pem)
            }
            PrivateKeyConfig::Value { key } => Self::from_pem(key),
            PrivateKeyConfig::Generate => Self::generate(),
        }
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// Get the inner private key.
    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}
