//! Application state shared across handlers.

use folio_core::config::AppConfig;
use folio_metadata::ChapterStore;
use folio_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Chapter record store.
    pub chapters: Arc<dyn ChapterStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The configuration must already be validated.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        chapters: Arc<dyn ChapterStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            chapters,
        }
    }
}
