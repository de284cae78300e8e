//! Prompts sent to a backend.

use serde::Serialize;
use std::sync::Arc;

/// System and user text for one backend call.
///
/// `system` is shared: every call on a path that uses the same artifact
/// points at one rendered prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: Arc<str>,
    pub user: String,
}

impl Prompt {
    /// Prompt with a shared system part.
    pub fn new(system: impl Into<Arc<str>>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Total size in bytes, used for logging.
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    /// Whether both parts are empty.
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}
