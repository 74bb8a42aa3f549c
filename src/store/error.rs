use crate::model::{ItemId, ParentKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Order {order} in {parent} is already held by {occupant}")]
    ConstraintViolation {
        parent: ParentKey,
        order: i64,
        occupant: ItemId,
    },

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid parent key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound(id.into())
    }

    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}
