//! Optimizer artifacts: a trained instruction plus ordered demonstrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::path::CommunicationPath;
use crate::domain::errors::ArtifactError;

/// One few-shot demonstration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonstration {
    pub input: serde_json::Value,
    #[serde(default)]
    pub reasoning: String,
    pub output: serde_json::Value,
}

/// How an artifact was produced. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub train_examples: usize,
    pub validation_examples: usize,
    /// Backend calls that failed and were skipped.
    pub skipped_calls: usize,
    pub max_rounds: u32,
    pub max_demos: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

/// Persisted, versioned optimizer for a single communication path.
///
/// Immutable once saved; retraining writes a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerArtifact {
    pub path: CommunicationPath,
    pub instruction: String,
    pub demonstrations: Vec<Demonstration>,
    pub training_score: f64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TrainingMetadata,
}

impl OptimizerArtifact {
    /// Structural checks applied before an artifact is used to build prompts.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.version == 0 {
            return Err(ArtifactError::Invalid("version must start at 1".to_string()));
        }
        if self.instruction.trim().is_empty() {
            return Err(ArtifactError::Invalid("instruction is empty".to_string()));
        }
        if !self.training_score.is_finite() || !(0.0..=1.0).contains(&self.training_score) {
            return Err(ArtifactError::Invalid(format!(
                "training_score {} outside [0, 1]",
                self.training_score
            )));
        }
        for (index, demo) in self.demonstrations.iter().enumerate() {
            if demo.input.is_null() || demo.output.is_null() {
                return Err(ArtifactError::Invalid(format!(
                    "demonstration {index} is missing input or output"
                )));
            }
        }
        Ok(())
    }

    /// Validate and additionally check the artifact belongs to `path`.
    pub fn validate_for(&self, path: &CommunicationPath) -> Result<(), ArtifactError> {
        if &self.path != path {
            return Err(ArtifactError::Invalid(format!(
                "artifact is for {} but was loaded for {}",
                self.path, path
            )));
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentRole, PrincessDomain};
    use serde_json::json;

    fn artifact() -> OptimizerArtifact {
        OptimizerArtifact {
            path: CommunicationPath::new(AgentRole::Queen, AgentRole::Princess(PrincessDomain::Development)),
            instruction: "Decompose the task into drone-sized steps.".to_string(),
            demonstrations: vec![Demonstration {
                input: json!({"description": "add login", "tags": ["auth", "ui"]}),
                reasoning: "split by layer".to_string(),
                output: json!({"steps": ["api", "ui"]}),
            }],
            training_score: 0.8125,
            version: 2,
            created_at: Utc::now(),
            metadata: TrainingMetadata {
                train_examples: 8,
                validation_examples: 2,
                skipped_calls: 1,
                max_rounds: 2,
                max_demos: 4,
                metric: Some("exact_match".to_string()),
            },
        }
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let original = artifact();
        let text = serde_json::to_string_pretty(&original).unwrap();
        let back: OptimizerArtifact = serde_json::from_str(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_serialized_path_shape() {
        let json = serde_json::to_value(artifact()).unwrap();
        assert_eq!(json["path"]["source"], "queen");
        assert_eq!(json["path"]["destination"], "princess-dev");
    }

    #[test]
    fn test_validation() {
        assert!(artifact().validate().is_ok());

        let mut bad = artifact();
        bad.instruction = "  ".to_string();
        assert!(matches!(bad.validate(), Err(ArtifactError::Invalid(_))));

        let mut bad = artifact();
        bad.training_score = f64::NAN;
        assert!(bad.validate().is_err());

        let mut bad = artifact();
        bad.version = 0;
        assert!(bad.validate().is_err());

        let mut bad = artifact();
        bad.demonstrations[0].output = serde_json::Value::Null;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_for_other_path() {
        let other = CommunicationPath::new(AgentRole::Queen, AgentRole::Princess(PrincessDomain::Quality));
        assert!(artifact().validate_for(&other).is_err());
    }
}
