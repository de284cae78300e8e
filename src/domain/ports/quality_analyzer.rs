//! Static analyzer port.

use async_trait::async_trait;

use crate::domain::models::QualityReport;

/// Boundary to the external static analyzer.
#[async_trait]
pub trait QualityAnalyzer: Send + Sync {
    /// Analyze `target` (a path or module name) and report findings.
    async fn analyze(&self, target: &str) -> anyhow::Result<QualityReport>;
}
