//! Per-path cache of compiled optimizer artifacts.
//!
//! Entries live until invalidated or replaced. Absence is cached too, so a
//! path without an artifact costs one store lookup, not one per request.
//! Readers clone the `Arc`; installing a new version swaps the `Arc` in the
//! map and never touches the old `CompiledArtifact`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::prompt::CompiledArtifact;
use crate::domain::errors::ArtifactError;
use crate::domain::models::{CommunicationPath, FallbackReason, OptimizerArtifact};
use crate::domain::ports::ArtifactStore;

/// What the cache knows about a path.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Present(Arc<CompiledArtifact>),
    Absent(FallbackReason),
}

impl CacheEntry {
    /// The compiled artifact, when present.
    pub fn artifact(&self) -> Option<&Arc<CompiledArtifact>> {
        match self {
            Self::Present(compiled) => Some(compiled),
            Self::Absent(_) => None,
        }
    }
}

/// Per-path cache of compiled artifacts in front of an [`ArtifactStore`].
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
    entries: RwLock<HashMap<CommunicationPath, CacheEntry>>,
}

impl ArtifactCache {
    /// Empty cache over `store`.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The store misses are loaded from.
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Cached entry for `path`, loading from the store on a miss.
    ///
    /// Never fails: load or validation problems are cached as
    /// `Absent(ArtifactUnusable)`.
    pub async fn get(&self, path: &CommunicationPath) -> CacheEntry {
        if let Some(entry) = self.entries.read().await.get(path) {
            return entry.clone();
        }

        let loaded = self.load(path).await;

        let mut entries = self.entries.write().await;
        // Another caller may have filled or installed the entry while we loaded.
        entries.entry(*path).or_insert(loaded).clone()
    }

    async fn load(&self, path: &CommunicationPath) -> CacheEntry {
        match self.store.load_latest(path).await {
            Ok(Some(artifact)) => match compile_for(path, artifact) {
                Ok(compiled) => {
                    debug!(%path, version = compiled.version(), "artifact cached");
                    CacheEntry::Present(Arc::new(compiled))
                }
                Err(e) => {
                    warn!(%path, error = %e, "stored artifact failed validation, using baseline prompts");
                    CacheEntry::Absent(FallbackReason::ArtifactUnusable)
                }
            },
            Ok(None) => {
                debug!(%path, "no artifact stored");
                CacheEntry::Absent(FallbackReason::NoArtifact)
            }
            Err(e) => {
                warn!(%path, error = %e, "failed to load artifact, using baseline prompts");
                CacheEntry::Absent(FallbackReason::ArtifactUnusable)
            }
        }
    }

    /// Replace the cached entry for the artifact's path.
    pub async fn install(&self, artifact: OptimizerArtifact) -> Result<Arc<CompiledArtifact>, ArtifactError> {
        let path = artifact.path;
        let compiled = Arc::new(CompiledArtifact::compile(artifact)?);
        self.entries
            .write()
            .await
            .insert(path, CacheEntry::Present(Arc::clone(&compiled)));
        info!(%path, version = compiled.version(), "artifact installed");
        Ok(compiled)
    }

    /// Forget `path`; the next `get` goes back to the store.
    pub async fn invalidate(&self, path: &CommunicationPath) {
        if self.entries.write().await.remove(path).is_some() {
            debug!(%path, "artifact cache entry invalidated");
        }
    }

    /// Forget every path; each is reloaded on next use.
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    /// Reload `path` from the store now.
    pub async fn refresh(&self, path: &CommunicationPath) -> CacheEntry {
        let loaded = self.load(path).await;
        self.entries.write().await.insert(*path, loaded.clone());
        loaded
    }

    /// Paths currently holding a compiled artifact, with their versions.
    pub async fn cached_versions(&self) -> Vec<(CommunicationPath, u64)> {
        let entries = self.entries.read().await;
        let mut versions: Vec<_> = entries
            .iter()
            .filter_map(|(path, entry)| entry.artifact().map(|a| (*path, a.version())))
            .collect();
        versions.sort();
        versions
    }
}

fn compile_for(path: &CommunicationPath, artifact: OptimizerArtifact) -> Result<CompiledArtifact, ArtifactError> {
    artifact.validate_for(path)?;
    CompiledArtifact::compile(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryArtifactStore;
    use crate::domain::models::{AgentRole, PrincessDomain, TrainingMetadata};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn path() -> CommunicationPath {
        CommunicationPath::new(AgentRole::Queen, AgentRole::Princess(PrincessDomain::Quality))
    }

    fn artifact(version: u64) -> OptimizerArtifact {
        OptimizerArtifact {
            path: path(),
            instruction: format!("Review carefully (v{version})."),
            demonstrations: vec![],
            training_score: 0.9,
            version,
            created_at: Utc::now(),
            metadata: TrainingMetadata::default(),
        }
    }

    /// Store that counts lookups and always fails.
    #[derive(Default)]
    struct BrokenStore {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn load_latest(&self, path: &CommunicationPath) -> Result<Option<OptimizerArtifact>, ArtifactError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(ArtifactError::Load {
                location: path.to_string(),
                reason: "disk on fire".to_string(),
            })
        }
        async fn load_version(&self, _: &CommunicationPath, _: u64) -> Result<Option<OptimizerArtifact>, ArtifactError> {
            Ok(None)
        }
        async fn latest_version(&self, _: &CommunicationPath) -> Result<u64, ArtifactError> {
            Ok(0)
        }
        async fn save(&self, _: &OptimizerArtifact) -> Result<(), ArtifactError> {
            Ok(())
        }
        async fn history(&self, _: &CommunicationPath) -> Result<Vec<OptimizerArtifact>, ArtifactError> {
            Ok(vec![])
        }
        async fn list_paths(&self) -> Result<Vec<CommunicationPath>, ArtifactError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_absence_is_cached() {
        let store = Arc::new(BrokenStore::default());
        let cache = ArtifactCache::new(store.clone());

        for _ in 0..3 {
            assert!(matches!(
                cache.get(&path()).await,
                CacheEntry::Absent(FallbackReason::ArtifactUnusable)
            ));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_artifact_survives_store_removal() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.save(&artifact(1)).await.unwrap();
        let cache = ArtifactCache::new(store.clone());

        let first = cache.get(&path()).await.artifact().cloned().unwrap();
        store.remove(&path()).await;
        let second = cache.get(&path()).await.artifact().cloned().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate(&path()).await;
        assert!(matches!(cache.get(&path()).await, CacheEntry::Absent(FallbackReason::NoArtifact)));
    }

    #[tokio::test]
    async fn test_install_swaps_without_mutating_old() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.save(&artifact(1)).await.unwrap();
        let cache = ArtifactCache::new(store.clone());

        let old = cache.get(&path()).await.artifact().cloned().unwrap();
        cache.install(artifact(2)).await.unwrap();
        let new = cache.get(&path()).await.artifact().cloned().unwrap();

        assert_eq!(old.version(), 1);
        assert!(old.prefix().contains("v1"));
        assert_eq!(new.version(), 2);
        assert_eq!(cache.cached_versions().await, vec![(path(), 2)]);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_version() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let cache = ArtifactCache::new(store.clone());
        assert!(cache.get(&path()).await.artifact().is_none());

        store.save(&artifact(1)).await.unwrap();
        assert!(cache.get(&path()).await.artifact().is_none());

        let refreshed = cache.refresh(&path()).await;
        assert_eq!(refreshed.artifact().map(|a| a.version()), Some(1));

        cache.invalidate_all().await;
        assert!(cache.cached_versions().await.is_empty());
    }
}
