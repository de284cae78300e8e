//! Artifact store implementations and the store factory.

pub mod file;
pub mod memory;

pub use file::FileArtifactStore;
pub use memory::InMemoryArtifactStore;

use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, DatabaseError, SqliteArtifactStore};
use crate::domain::models::{StoreConfig, StoreKind};
use crate::domain::ports::ArtifactStore;

/// Open the store selected by configuration. `path_override` replaces the
/// file store root (the training CLI's `--output`).
pub async fn open_store(
    config: &StoreConfig,
    path_override: Option<&std::path::Path>,
) -> Result<Arc<dyn ArtifactStore>, DatabaseError> {
    match (config.kind, path_override) {
        (_, Some(root)) => Ok(Arc::new(FileArtifactStore::new(root))),
        (StoreKind::File, None) => Ok(Arc::new(FileArtifactStore::new(&config.path))),
        (StoreKind::Sqlite, None) => {
            let pool = initialize_database(&config.database_url).await?;
            Ok(Arc::new(SqliteArtifactStore::new(pool)))
        }
    }
}
