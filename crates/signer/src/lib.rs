//! CDN URL signing for the Folio media delivery server.
//!
//! This crate provides:
//! - RSA key loading and generation
//! - Canned-policy URL signing for a CDN distribution
//! - Signature verification (used by tests and tooling)

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::SigningKey;
pub use signer::{CdnUrlSigner, SignedUrl, verify_url_signature};
