//! In-memory artifact store for tests and dry runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::domain::errors::ArtifactError;
use crate::domain::models::{CommunicationPath, OptimizerArtifact};
use crate::domain::ports::ArtifactStore;

/// Process-local [`ArtifactStore`], used in tests and one-off runs.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<CommunicationPath, BTreeMap<u64, OptimizerArtifact>>>,
}

impl InMemoryArtifactStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every version for `path`.
    pub async fn remove(&self, path: &CommunicationPath) {
        self.artifacts.write().await.remove(path);
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn load_latest(&self, path: &CommunicationPath) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts
            .get(path)
            .and_then(|versions| versions.values().next_back())
            .cloned())
    }

    async fn load_version(
        &self,
        path: &CommunicationPath,
        version: u64,
    ) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.get(path).and_then(|versions| versions.get(&version)).cloned())
    }

    async fn latest_version(&self, path: &CommunicationPath) -> Result<u64, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts
            .get(path)
            .and_then(|versions| versions.keys().next_back().copied())
            .unwrap_or(0))
    }

    async fn save(&self, artifact: &OptimizerArtifact) -> Result<(), ArtifactError> {
        artifact.validate()?;
        let mut artifacts = self.artifacts.write().await;
        let versions = artifacts.entry(artifact.path).or_default();
        if versions.contains_key(&artifact.version) {
            return Err(ArtifactError::VersionConflict {
                path: artifact.path,
                version: artifact.version,
            });
        }
        versions.insert(artifact.version, artifact.clone());
        Ok(())
    }

    async fn history(&self, path: &CommunicationPath) -> Result<Vec<OptimizerArtifact>, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts
            .get(path)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_paths(&self) -> Result<Vec<CommunicationPath>, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        let mut paths: Vec<_> = artifacts
            .iter()
            .filter(|(_, versions)| !versions.is_empty())
            .map(|(path, _)| *path)
            .collect();
        paths.sort();
        Ok(paths)
    }
}
