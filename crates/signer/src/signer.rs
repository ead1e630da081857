//! CDN URL signing and verification.
//!
//! Streaming URLs for CDN-fronted storage carry a canned policy
//! signature the distribution verifies at the edge: an RSA-SHA1
//! PKCS#1 v1.5 signature over a policy JSON naming the resource URL
//! and an absolute expiry epoch. The signature travels in the query
//! string using a URL-safe base64 variant.

use crate::error::{SignerError, SignerResult};
use crate::key::SigningKey;
use base64::Engine;
use folio_core::config::CdnConfig;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;

/// A time-limited URL for a stored object.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedUrl {
    /// The full URL, including any credential query parameters.
    pub url: String,
    /// When the URL stops being honored.
    pub expires_at: OffsetDateTime,
}

/// Signs object URLs for a CDN distribution.
pub struct CdnUrlSigner {
    domain: String,
    key_pair_id: String,
    key: SigningKey,
}

impl std::fmt::Debug for CdnUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnUrlSigner")
            .field("domain", &self.domain)
            .field("key_pair_id", &self.key_pair_id)
            .finish_non_exhaustive()
    }
}

impl CdnUrlSigner {
    /// Create a new signer from a loaded key.
    pub fn new(domain: impl Into<String>, key_pair_id: impl Into<String>, key: SigningKey) -> Self {
        Self {
            domain: domain.into(),
            key_pair_id: key_pair_id.into(),
            key,
        }
    }

    /// Create from configuration, loading the key from its source.
    pub fn from_config(config: &CdnConfig) -> SignerResult<Self> {
        let key = SigningKey::from_config(&config.private_key)?;
        Ok(Self::new(
            config.domain.clone(),
            config.key_pair_id.clone(),
            key,
        ))
    }

    /// Generate a signer with a random key (for development and tests).
    pub fn generate(
        domain: impl Into<String>,
        key_pair_id: impl Into<String>,
    ) -> SignerResult<Self> {
        Ok(Self::new(domain, key_pair_id, SigningKey::generate()?))
    }

    /// Get the distribution domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Get the public half of the signing key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.key.public_key()
    }

    /// Sign a resource URL for `key`, valid for `ttl`.
    pub fn sign_url(&self, key: &str, ttl: time::Duration) -> SignerResult<SignedUrl> {
        let expires_at = OffsetDateTime::now_utc() + ttl;
        self.sign_url_until(key, expires_at)
    }

    /// Sign a resource URL with an explicit expiry instant.
    pub fn sign_url_until(&self, key: &str, expires_at: OffsetDateTime) -> SignerResult<SignedUrl> {
        let resource = format!("https://{}/{}", self.domain, key);
        let expires = expires_at.unix_timestamp();
        let policy = canned_policy(&resource, expires);

        let digest = Sha1::digest(policy.as_bytes());
        let signature = self
            .key
            .private_key()
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let url = format!(
            "{resource}?Expires={expires}&Signature={}&Key-Pair-Id={}",
            encode_signature(&signature),
            self.key_pair_id
        );

        Ok(SignedUrl { url, expires_at })
    }
}

/// The canned policy document the CDN edge reconstructs and verifies.
fn canned_policy(resource: &str, expires: i64) -> String {
    format!(
        r#"{{"Statement":[{{"Resource":"{resource}","Condition":{{"DateLessThan":{{"AWS:EpochTime":{expires}}}}}}}]}}"#
    )
}

/// Encode signature bytes with the CDN's URL-safe base64 alphabet.
///
/// Standard base64 with `+` replaced by `-`, `=` by `_`, and `/` by `~`
/// so the value survives unescaped in a query string.
fn encode_signature(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD
        .encode(bytes)
        .replace('+', "-")
        .replace('=', "_")
        .replace('/', "~")
}

/// Decode a signature from the CDN's URL-safe base64 alphabet.
fn decode_signature(s: &str) -> SignerResult<Vec<u8>> {
    let standard = s.replace('-', "+").replace('_', "=").replace('~', "/");
    base64::engine::general_purpose::STANDARD
        .decode(standard)
        .map_err(|e| SignerError::InvalidSignature(format!("invalid base64: {e}")))
}

/// Verify the canned-policy signature on a signed URL.
///
/// Checks the signature only; callers decide whether an expired URL is
/// acceptable for their purpose.
pub fn verify_url_signature(url: &str, public_key: &RsaPublicKey) -> SignerResult<()> {
    let (resource, query) = url
        .split_once('?')
        .ok_or_else(|| SignerError::InvalidUrl("missing query string".to_string()))?;

    let mut expires: Option<i64> = None;
    let mut signature: Option<Vec<u8>> = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("Expires", v)) => {
                expires = Some(
                    v.parse()
                        .map_err(|_| SignerError::InvalidUrl(format!("invalid Expires value: {v}")))?,
                );
            }
            Some(("Signature", v)) => {
                signature = Some(decode_signature(v)?);
            }
            _ => {}
        }
    }

    let expires =
        expires.ok_or_else(|| SignerError::InvalidUrl("missing Expires parameter".to_string()))?;
    let signature = signature
        .ok_or_else(|| SignerError::InvalidUrl("missing Signature parameter".to_string()))?;

    let policy = canned_policy(resource, expires);
    let digest = Sha1::digest(policy.as_bytes());

    public_key
        .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
        .map_err(|_| SignerError::VerificationFailed)
}
