//! Scoring functions used by the trainer.
//!
//! A metric is a pure function of `(expected, candidate)`. Values arrive in
//! natural JSON form; comparisons go through [`CanonicalValue`] so object key
//! order never matters, and numbers compare by value (`1` equals `1.0`).

use serde_json::Value;

use crate::domain::models::CanonicalValue;

/// Scores a candidate output against the expected one.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Raw score. May be anything; use [`Metric::evaluate`].
    fn score(&self, expected: &Value, candidate: &Value) -> f64;

    /// Score clamped to `[0, 1]`, with non-finite results mapped to 0.
    fn evaluate(&self, expected: &Value, candidate: &Value) -> f64 {
        clamp_score(self.score(expected, candidate))
    }
}

/// Clamp to `[0, 1]`; non-finite scores become 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// 1.0 when the values are structurally equal, else 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Metric for ExactMatch {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn score(&self, expected: &Value, candidate: &Value) -> f64 {
        if values_equal(expected, candidate) {
            1.0
        } else {
            0.0
        }
    }
}

/// Partial credit for structured outputs.
///
/// Objects score the fraction of expected fields the candidate reproduces,
/// sequences the fraction of matching positions over the longer length.
/// Anything else falls back to exact match.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldOverlap;

impl Metric for FieldOverlap {
    fn name(&self) -> &str {
        "field_overlap"
    }

    fn score(&self, expected: &Value, candidate: &Value) -> f64 {
        match (expected, candidate) {
            (Value::Object(want), Value::Object(got)) => {
                if want.is_empty() {
                    return if got.is_empty() { 1.0 } else { 0.0 };
                }
                let hits = want
                    .iter()
                    .filter(|(key, value)| got.get(*key).is_some_and(|g| values_equal(value, g)))
                    .count();
                hits as f64 / want.len() as f64
            }
            (Value::Array(want), Value::Array(got)) => {
                let longest = want.len().max(got.len());
                if longest == 0 {
                    return 1.0;
                }
                let hits = want.iter().zip(got).filter(|(w, g)| values_equal(w, g)).count();
                hits as f64 / longest as f64
            }
            _ => ExactMatch.score(expected, candidate),
        }
    }
}

/// Metric backed by a closure.
pub struct FnMetric<F> {
    name: String,
    f: F,
}

impl<F> FnMetric<F>
where
    F: Fn(&Value, &Value) -> f64 + Send + Sync,
{
    /// Wrap `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Metric for FnMetric<F>
where
    F: Fn(&Value, &Value) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, expected: &Value, candidate: &Value) -> f64 {
        (self.f)(expected, candidate)
    }
}

/// Look up a built-in metric by name.
pub fn builtin(name: &str) -> Option<Box<dyn Metric>> {
    match name {
        "exact_match" | "exact" => Some(Box::new(ExactMatch)),
        "field_overlap" | "overlap" => Some(Box::new(FieldOverlap)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    canonical_equal(&CanonicalValue::from_json(a), &CanonicalValue::from_json(b))
}

fn canonical_equal(a: &CanonicalValue, b: &CanonicalValue) -> bool {
    match (a, b) {
        (CanonicalValue::Number(x), CanonicalValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (CanonicalValue::Tuple(x), CanonicalValue::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| canonical_equal(a, b))
        }
        (CanonicalValue::Record(x), CanonicalValue::Record(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && canonical_equal(va, vb))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_match_ignores_key_order_and_number_form() {
        let m = ExactMatch;
        assert_eq!(m.evaluate(&json!({"a": 1, "b": [1, 2]}), &json!({"b": [1, 2], "a": 1.0})), 1.0);
        assert_eq!(m.evaluate(&json!([1, 2]), &json!([2, 1])), 0.0);
        assert_eq!(m.evaluate(&json!("x"), &json!(null)), 0.0);
    }

    #[test]
    fn test_field_overlap() {
        let m = FieldOverlap;
        let expected = json!({"steps": ["a", "b"], "owner": "drone", "risk": "low", "eta": 3});
        let candidate = json!({"steps": ["a", "b"], "owner": "drone", "risk": "high"});
        assert!((m.evaluate(&expected, &candidate) - 0.5).abs() < f64::EPSILON);

        assert!((m.evaluate(&json!([1, 2, 3, 4]), &json!([1, 2, 9])) - 0.5).abs() < f64::EPSILON);
        assert_eq!(m.evaluate(&json!({}), &json!({})), 1.0);
        assert_eq!(m.evaluate(&json!(7), &json!(7)), 1.0);
    }

    #[test]
    fn test_fn_metric_is_clamped() {
        let wild = FnMetric::new("wild", |_: &Value, _: &Value| 3.5);
        assert_eq!(wild.evaluate(&json!(1), &json!(1)), 1.0);

        let negative = FnMetric::new("neg", |_: &Value, _: &Value| -1.0);
        assert_eq!(negative.evaluate(&json!(1), &json!(1)), 0.0);

        let nan = FnMetric::new("nan", |_: &Value, _: &Value| f64::NAN);
        assert_eq!(nan.evaluate(&json!(1), &json!(1)), 0.0);
        assert_eq!(nan.name(), "nan");
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin("exact_match").unwrap().name(), "exact_match");
        assert_eq!(builtin("overlap").unwrap().name(), "field_overlap");
        assert!(builtin("bleu").is_none());
    }
}
