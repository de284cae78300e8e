//! JSON file artifact store.
//!
//! Layout: `<root>/<source>--<destination>/v<version>.json`. Every version is
//! a separate file. Publishing writes a temp file and hard-links it to the
//! final name, so a version is never half-written and never overwritten.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::ArtifactError;
use crate::domain::models::{CommunicationPath, OptimizerArtifact};
use crate::domain::ports::ArtifactStore;

/// Artifact store keeping one JSON file per version under `<root>/<source>--<destination>/`.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Store rooted at `root`; directories are created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_dir(&self, path: &CommunicationPath) -> PathBuf {
        self.root.join(path.storage_key())
    }

    /// Location of `version` for `path`, whether or not it exists.
    pub fn version_file(&self, path: &CommunicationPath, version: u64) -> PathBuf {
        self.path_dir(path).join(format!("v{version}.json"))
    }

    /// Stored version numbers for `path`, ascending.
    async fn versions(&self, path: &CommunicationPath) -> Result<Vec<u64>, ArtifactError> {
        let dir = self.path_dir(path);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(version) = parse_version_file(&name.to_string_lossy()) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read(&self, path: &CommunicationPath, version: u64) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        let file = self.version_file(path, version);
        let text = match fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ArtifactError::Load {
                    location: file.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let artifact: OptimizerArtifact = serde_json::from_str(&text).map_err(|e| ArtifactError::Load {
            location: file.display().to_string(),
            reason: e.to_string(),
        })?;
        artifact.validate_for(path)?;
        if artifact.version != version {
            return Err(ArtifactError::Invalid(format!(
                "{} declares version {}",
                file.display(),
                artifact.version
            )));
        }
        Ok(Some(artifact))
    }
}

fn parse_version_file(name: &str) -> Option<u64> {
    name.strip_prefix('v')?.strip_suffix(".json")?.parse().ok()
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn load_latest(&self, path: &CommunicationPath) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        match self.versions(path).await?.last() {
            Some(&version) => self.read(path, version).await,
            None => Ok(None),
        }
    }

    async fn load_version(
        &self,
        path: &CommunicationPath,
        version: u64,
    ) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        self.read(path, version).await
    }

    async fn latest_version(&self, path: &CommunicationPath) -> Result<u64, ArtifactError> {
        Ok(self.versions(path).await?.last().copied().unwrap_or(0))
    }

    async fn save(&self, artifact: &OptimizerArtifact) -> Result<(), ArtifactError> {
        artifact.validate()?;

        let dir = self.path_dir(&artifact.path);
        fs::create_dir_all(&dir).await?;

        let target = self.version_file(&artifact.path, artifact.version);
        let tmp = dir.join(format!(".v{}.{}.tmp", artifact.version, Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(artifact)?;
        fs::write(&tmp, &body).await?;

        let linked = fs::hard_link(&tmp, &target).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!(file = %tmp.display(), error = %e, "failed to remove temporary artifact file");
        }

        match linked {
            Ok(()) => {
                debug!(path = %artifact.path, version = artifact.version, file = %target.display(), "artifact saved");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ArtifactError::VersionConflict {
                path: artifact.path,
                version: artifact.version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn history(&self, path: &CommunicationPath) -> Result<Vec<OptimizerArtifact>, ArtifactError> {
        let mut artifacts = Vec::new();
        for version in self.versions(path).await? {
            if let Some(artifact) = self.read(path, version).await? {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    async fn list_paths(&self) -> Result<Vec<CommunicationPath>, ArtifactError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(path) = CommunicationPath::from_storage_key(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            if !self.versions(&path).await?.is_empty() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
