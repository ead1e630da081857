//! Core domain types and shared logic for the Folio media delivery server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Storage key derivation and the per-book key namespace
//! - Chapter encoding lifecycle states and transitions
//! - Access scopes for authorization
//! - Configuration types

pub mod chapter;
pub mod config;
pub mod error;
pub mod keys;
pub mod scope;

pub use chapter::{ChapterStatus, EncodingOutcome, MediaInfo};
pub use error::{Error, Result};
pub use keys::{KeyPrefix, book_prefix, generate_key, sanitize_filename};
pub use scope::Scope;

/// Default maximum upload size: 100 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Default streaming URL lifetime in seconds.
pub const DEFAULT_STREAM_TTL_SECS: u64 = 90;

/// Minimum allowed streaming URL lifetime in seconds.
pub const MIN_STREAM_TTL_SECS: u64 = 60;

/// Maximum allowed streaming URL lifetime in seconds.
pub const MAX_STREAM_TTL_SECS: u64 = 120;
