use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The receiver fell behind and `0` events were skipped.
    #[error("Change feed degraded: {0} events may have been lost")]
    ChannelDegraded(u64),

    #[error("Change feed closed")]
    Closed,
}

impl From<RecvError> for FeedError {
    fn from(error: RecvError) -> Self {
        match error {
            RecvError::Lagged(missed) => FeedError::ChannelDegraded(missed),
            RecvError::Closed => FeedError::Closed,
        }
    }
}
