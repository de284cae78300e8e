//! Training dataset loading.
//!
//! Accepts a JSON array (`.json`), one JSON object per line (`.jsonl`), or a
//! YAML sequence (`.yaml` / `.yml`). Examples without an id get `ex-NNNN`
//! from their position in the file.

use std::collections::HashSet;
use std::path::Path;

use crate::domain::errors::TrainingError;
use crate::domain::models::Example;

/// On-disk dataset encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    JsonLines,
    Yaml,
}

impl DatasetFormat {
    /// Format for `path`'s extension, if supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Read and validate a dataset file.
pub async fn load_dataset(path: &Path) -> Result<Vec<Example>, TrainingError> {
    let format = DatasetFormat::from_path(path).ok_or_else(|| {
        TrainingError::InvalidDataset(format!(
            "{}: unsupported extension, expected .json, .jsonl, .yaml or .yml",
            path.display()
        ))
    })?;

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TrainingError::InvalidDataset(format!("{}: {e}", path.display())))?;

    parse_dataset(&text, format).map_err(|e| match e {
        TrainingError::InvalidDataset(reason) => TrainingError::InvalidDataset(format!("{}: {reason}", path.display())),
        other => other,
    })
}

/// Parse dataset text in the given format.
pub fn parse_dataset(text: &str, format: DatasetFormat) -> Result<Vec<Example>, TrainingError> {
    let mut examples: Vec<Example> = match format {
        DatasetFormat::Json => {
            serde_json::from_str(text).map_err(|e| TrainingError::InvalidDataset(e.to_string()))?
        }
        DatasetFormat::JsonLines => text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .map_err(|e| TrainingError::InvalidDataset(format!("line {}: {e}", index + 1)))
            })
            .collect::<Result<_, _>>()?,
        DatasetFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| TrainingError::InvalidDataset(e.to_string()))?
        }
    };

    assign_ids(&mut examples)?;
    Ok(examples)
}

fn assign_ids(examples: &mut [Example]) -> Result<(), TrainingError> {
    for (index, example) in examples.iter_mut().enumerate() {
        if example.id.trim().is_empty() {
            example.id = format!("ex-{index:04}");
        }
    }

    let mut seen = HashSet::with_capacity(examples.len());
    for example in examples.iter() {
        if !seen.insert(example.id.as_str()) {
            return Err(TrainingError::InvalidDataset(format!("duplicate example id '{}'", example.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_array() {
        let text = r#"[
            {"id": "a", "input_fields": {"q": 1}, "expected_output": 2},
            {"input_fields": {"q": 2}, "expected_output": 4, "quality_label": "gold"}
        ]"#;
        let examples = parse_dataset(text, DatasetFormat::Json).unwrap();
        assert_eq!(examples[0].id, "a");
        assert_eq!(examples[1].id, "ex-0001");
        assert_eq!(examples[1].quality_label.as_deref(), Some("gold"));
    }

    #[test]
    fn test_jsonl_skips_blank_lines() {
        let text = "{\"input_fields\": [1], \"expected_output\": 1}\n\n{\"input_fields\": [2], \"expected_output\": 2}\n";
        let examples = parse_dataset(text, DatasetFormat::JsonLines).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1].input_fields, json!([2]));
    }

    #[test]
    fn test_jsonl_reports_line() {
        let text = "{\"input_fields\": 1, \"expected_output\": 1}\nnot json\n";
        let err = parse_dataset(text, DatasetFormat::JsonLines).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_yaml() {
        let text = r"
- id: first
  input_fields:
    description: list files
  expected_output:
    command: ls
";
        let examples = parse_dataset(text, DatasetFormat::Yaml).unwrap();
        assert_eq!(examples[0].expected_output, json!({"command": "ls"}));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let text = r#"[
            {"id": "x", "input_fields": 1, "expected_output": 1},
            {"id": "x", "input_fields": 2, "expected_output": 2}
        ]"#;
        assert!(matches!(
            parse_dataset(text, DatasetFormat::Json),
            Err(TrainingError::InvalidDataset(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.jsonl");
        std::fs::write(&file, "{\"input_fields\": 1, \"expected_output\": 1}\n").unwrap();
        assert_eq!(load_dataset(&file).await.unwrap().len(), 1);

        let other = dir.path().join("data.csv");
        std::fs::write(&other, "a,b\n").unwrap();
        assert!(load_dataset(&other).await.is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DatasetFormat::from_path(Path::new("a.YML")), Some(DatasetFormat::Yaml));
        assert_eq!(DatasetFormat::from_path(Path::new("a")), None);
    }
}
