use crate::model::ParentKey;
use thiserror::Error;

/// Terminal outcome of a failed reorder, surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Reorder of {parent} failed: {reason}")]
    OperationFailed { parent: ParentKey, reason: String },
}

impl ReorderError {
    pub fn failed(parent: &ParentKey, reason: impl Into<String>) -> Self {
        ReorderError::OperationFailed {
            parent: parent.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may simply issue the same request again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReorderError::OperationFailed { .. })
    }
}
