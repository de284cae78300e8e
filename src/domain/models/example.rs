//! Labeled training examples and their canonical form.
//!
//! Raw examples carry arbitrary JSON. Before an example is deduplicated,
//! cached, or scored it is normalized into a [`CanonicalValue`]: arrays become
//! immutable tuples and objects become sorted-key records, so two examples
//! with the same structure hash and compare equal no matter how they were
//! produced. The natural JSON form is restored only at the metric boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::task::Task;

/// A labeled training record as read from a dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub id: String,
    pub input_fields: serde_json::Value,
    pub expected_output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_label: Option<String>,
}

impl Example {
    /// Example with no label.
    pub fn new(id: impl Into<String>, input_fields: serde_json::Value, expected_output: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            input_fields,
            expected_output,
            quality_label: None,
        }
    }

    /// Attach a free-form label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.quality_label = Some(label.into());
        self
    }

    /// Normalize into the hashable form used for dedup and scoring.
    pub fn canonicalize(&self) -> CanonicalExample {
        CanonicalExample {
            id: self.id.clone(),
            input: CanonicalValue::from_json(&self.input_fields),
            expected: CanonicalValue::from_json(&self.expected_output),
            quality_label: self.quality_label.clone(),
        }
    }
}

/// Immutable, hashable JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(Arc<str>),
    Tuple(Arc<[CanonicalValue]>),
    Record(Arc<BTreeMap<String, CanonicalValue>>),
}

impl CanonicalValue {
    /// Canonical form of `value`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(normalize_number(n)),
            serde_json::Value::String(s) => Self::Text(Arc::from(s.as_str())),
            serde_json::Value::Array(items) => Self::Tuple(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Record(Arc::new(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect(),
            )),
        }
    }

    /// Convert back to the natural, mutable JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Text(s) => serde_json::Value::String(s.to_string()),
            Self::Tuple(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Fields, when this is a JSON object.
    pub fn as_record(&self) -> Option<&BTreeMap<String, CanonicalValue>> {
        match self {
            Self::Record(map) => Some(map.as_ref()),
            _ => None,
        }
    }

    /// Text, when this is a JSON string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_ref()),
            _ => None,
        }
    }
}

/// Integral floats become integers so `1` and `1.0` hash alike.
fn normalize_number(n: &serde_json::Number) -> serde_json::Number {
    // 2^53: beyond this an f64 no longer holds every integer exactly.
    const EXACT: f64 = 9_007_199_254_740_992.0;
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= EXACT => {
            serde_json::Number::from(f as i64)
        }
        _ => n.clone(),
    }
}

impl From<&serde_json::Value> for CanonicalValue {
    fn from(value: &serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

/// Normalized example used by the trainer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalExample {
    pub id: String,
    pub input: CanonicalValue,
    pub expected: CanonicalValue,
    pub quality_label: Option<String>,
}

impl CanonicalExample {
    /// Structural identity used for deduplication; ignores the id.
    pub fn content_key(&self) -> (CanonicalValue, CanonicalValue) {
        (self.input.clone(), self.expected.clone())
    }

    /// Build the task a delegating agent would send for this example.
    ///
    /// `description` and `objective` are lifted from the input when present;
    /// the full input always travels as the payload.
    pub fn to_task(&self, task_type: &str, timeout_ms: u64) -> Task {
        let fields = self.input.as_record();
        let lookup = |key: &str| fields.and_then(|m| m.get(key)).and_then(CanonicalValue::as_text);

        Task {
            id: uuid::Uuid::new_v4(),
            task_type: lookup("type").unwrap_or(task_type).to_string(),
            description: lookup("description")
                .map_or_else(|| format!("Training example {}", self.id), ToString::to_string),
            objective: lookup("objective").unwrap_or_default().to_string(),
            payload: self.input.to_json(),
            priority: super::task::DEFAULT_PRIORITY,
            timeout_ms,
            dependencies: Vec::new(),
        }
    }
}
