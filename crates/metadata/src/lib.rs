//! Chapter record store for Folio.
//!
//! This crate provides the control-plane data model:
//! - Chapter records (keys, titles, ordering)
//! - The encoding status machine persisted as guarded SQL transitions
//! - Adjacent-swap reordering under a per-book unique index

pub mod error;
pub mod models;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ChapterRow, MoveDirection, NewChapter};
pub use store::{ChapterStore, SqliteStore};

use folio_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a chapter store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn ChapterStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn ChapterStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::config::MetadataConfig;

    #[tokio::test]
    async fn from_config_sqlite_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("metadata.db");
        let config = MetadataConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
