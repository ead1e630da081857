//! HTTP request handlers.

pub mod audio;
pub mod common;
pub mod encoding;
pub mod files;

pub use audio::*;
pub use common::*;
pub use encoding::*;
pub use files::*;
