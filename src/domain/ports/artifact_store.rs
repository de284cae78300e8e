//! Artifact persistence port.

use async_trait::async_trait;

use crate::domain::errors::ArtifactError;
use crate::domain::models::{CommunicationPath, OptimizerArtifact};

/// Durable, versioned storage for optimizer artifacts.
///
/// Versions for a path start at 1 and only grow. `save` must refuse to
/// replace an existing version.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Highest stored version for `path`, if any.
    async fn load_latest(&self, path: &CommunicationPath) -> Result<Option<OptimizerArtifact>, ArtifactError>;

    async fn load_version(
        &self,
        path: &CommunicationPath,
        version: u64,
    ) -> Result<Option<OptimizerArtifact>, ArtifactError>;

    /// Highest stored version, or 0 when nothing has been saved.
    async fn latest_version(&self, path: &CommunicationPath) -> Result<u64, ArtifactError>;

    /// Persist a new version. Fails with `VersionConflict` if it exists.
    async fn save(&self, artifact: &OptimizerArtifact) -> Result<(), ArtifactError>;

    /// All versions for `path`, oldest first.
    async fn history(&self, path: &CommunicationPath) -> Result<Vec<OptimizerArtifact>, ArtifactError>;

    /// Paths with at least one stored version.
    async fn list_paths(&self) -> Result<Vec<CommunicationPath>, ArtifactError>;
}
