//! HTTP API server for the Folio audiobook delivery pipeline.
//!
//! This crate provides the HTTP control plane:
//! - Chapter audio upload with validation and key derivation
//! - Chapter listing, rename, reorder, delete
//! - Encoding lifecycle callbacks
//! - Time-limited streaming URL issuance
//! - Raw object serving with byte-range support

pub mod auth;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod routes;
pub mod state;
pub mod stream;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
