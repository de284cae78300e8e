//! SQLite implementation of the ArtifactStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::ArtifactError;
use crate::domain::models::{AgentRole, CommunicationPath, OptimizerArtifact};
use crate::domain::ports::ArtifactStore;

const SELECT_COLUMNS: &str = "SELECT source, destination, version, instruction, demonstrations_json, \
     training_score, metadata_json, created_at FROM optimizer_artifacts";

/// SQLite-backed [`ArtifactStore`]; one row per `(source, destination, version)`.
#[derive(Clone)]
pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

impl SqliteArtifactStore {
    /// Store over an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    source: String,
    destination: String,
    version: i64,
    instruction: String,
    demonstrations_json: String,
    training_score: f64,
    metadata_json: String,
    created_at: String,
}

impl TryFrom<ArtifactRow> for OptimizerArtifact {
    type Error = ArtifactError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let location = format!("optimizer_artifacts[{}:{} v{}]", row.source, row.destination, row.version);
        let load_error = |reason: String| ArtifactError::Load {
            location: location.clone(),
            reason,
        };

        let source: AgentRole = row.source.parse().map_err(|e| load_error(format!("{e}")))?;
        let destination: AgentRole = row.destination.parse().map_err(|e| load_error(format!("{e}")))?;
        let version = u64::try_from(row.version).map_err(|e| load_error(e.to_string()))?;

        let artifact = OptimizerArtifact {
            path: CommunicationPath::new(source, destination),
            instruction: row.instruction,
            demonstrations: serde_json::from_str(&row.demonstrations_json).map_err(|e| load_error(e.to_string()))?,
            training_score: row.training_score,
            version,
            created_at: parse_datetime(&row.created_at).map_err(|e| load_error(e.to_string()))?,
            metadata: serde_json::from_str(&row.metadata_json).map_err(|e| load_error(e.to_string()))?,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

fn to_i64(version: u64) -> Result<i64, ArtifactError> {
    i64::try_from(version).map_err(|_| ArtifactError::Invalid(format!("version {version} is out of range")))
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn load_latest(&self, path: &CommunicationPath) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        let row: Option<ArtifactRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE source = ? AND destination = ? ORDER BY version DESC LIMIT 1"
        ))
        .bind(path.source.to_string())
        .bind(path.destination.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OptimizerArtifact::try_from).transpose()
    }

    async fn load_version(
        &self,
        path: &CommunicationPath,
        version: u64,
    ) -> Result<Option<OptimizerArtifact>, ArtifactError> {
        let row: Option<ArtifactRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE source = ? AND destination = ? AND version = ?"))
                .bind(path.source.to_string())
                .bind(path.destination.to_string())
                .bind(to_i64(version)?)
                .fetch_optional(&self.pool)
                .await?;

        row.map(OptimizerArtifact::try_from).transpose()
    }

    async fn latest_version(&self, path: &CommunicationPath) -> Result<u64, ArtifactError> {
        let (version,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM optimizer_artifacts WHERE source = ? AND destination = ?",
        )
        .bind(path.source.to_string())
        .bind(path.destination.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(version).unwrap_or(0))
    }

    async fn save(&self, artifact: &OptimizerArtifact) -> Result<(), ArtifactError> {
        artifact.validate()?;
        let demonstrations_json = serde_json::to_string(&artifact.demonstrations)?;
        let metadata_json = serde_json::to_string(&artifact.metadata)?;

        let result = sqlx::query(
            r"INSERT INTO optimizer_artifacts (source, destination, version, instruction, demonstrations_json, training_score, metadata_json, created_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(artifact.path.source.to_string())
        .bind(artifact.path.destination.to_string())
        .bind(to_i64(artifact.version)?)
        .bind(&artifact.instruction)
        .bind(&demonstrations_json)
        .bind(artifact.training_score)
        .bind(&metadata_json)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ArtifactError::VersionConflict {
                path: artifact.path,
                version: artifact.version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn history(&self, path: &CommunicationPath) -> Result<Vec<OptimizerArtifact>, ArtifactError> {
        let rows: Vec<ArtifactRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE source = ? AND destination = ? ORDER BY version ASC"))
                .bind(path.source.to_string())
                .bind(path.destination.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(OptimizerArtifact::try_from).collect()
    }

    async fn list_paths(&self) -> Result<Vec<CommunicationPath>, ArtifactError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT DISTINCT source, destination FROM optimizer_artifacts")
                .fetch_all(&self.pool)
                .await?;

        let mut paths = Vec::with_capacity(rows.len());
        for (source, destination) in rows {
            match (source.parse(), destination.parse()) {
                (Ok(source), Ok(destination)) => paths.push(CommunicationPath::new(source, destination)),
                _ => tracing::warn!(%source, %destination, "skipping artifact rows with unknown roles"),
            }
        }
        paths.sort();
        Ok(paths)
    }
}
