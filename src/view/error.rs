use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Item not found in view: {0}")]
    NotFound(String),

    #[error("View has no store attached")]
    Detached,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
