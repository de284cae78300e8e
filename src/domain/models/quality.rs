//! Code-quality report returned by an external static analyzer.

use serde::{Deserialize, Serialize};

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// One rule violation reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFinding {
    pub rule_id: String,
    pub severity: Severity,
    /// Free-form location, usually `file:line`.
    pub location: String,
}

/// Findings for one analyzed target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub findings: Vec<QualityFinding>,
}

impl QualityReport {
    /// Whether there are no findings.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings at or above `threshold`.
    pub fn at_least(&self, threshold: Severity) -> impl Iterator<Item = &QualityFinding> {
        self.findings.iter().filter(move |f| f.severity >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_filter() {
        let report = QualityReport {
            findings: vec![
                QualityFinding {
                    rule_id: "god-object".to_string(),
                    severity: Severity::High,
                    location: "src/lib.rs:1".to_string(),
                },
                QualityFinding {
                    rule_id: "magic-number".to_string(),
                    severity: Severity::Low,
                    location: "src/util.rs:40".to_string(),
                },
            ],
        };
        assert!(!report.is_clean());
        assert_eq!(report.at_least(Severity::Medium).count(), 1);
    }
}
