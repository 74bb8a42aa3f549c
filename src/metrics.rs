use std::time::{Duration, Instant};
use tracing::info;

/// A timer that logs the duration of an operation when dropped.
///
/// ```ignore
/// let _timer = OperationTimer::new("move_item", parent.to_string());
/// ```
pub struct OperationTimer {
    name: &'static str,
    scope: String,
    start: Instant,
}

impl OperationTimer {
    /// Create a new timer for the given operation name and collection scope.
    #[must_use]
    pub fn new(name: &'static str, scope: impl Into<String>) -> Self {
        Self {
            name,
            scope: scope.into(),
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.name,
            scope = %self.scope,
            duration_ms = %duration.as_millis(),
            "Operation completed"
        );
    }
}

/// Generate a short operation ID for log correlation.
#[must_use]
pub fn generate_operation_id() -> String {
    let uuid_str = uuid::Uuid::new_v4().to_string();
    uuid_str.get(..8).unwrap_or(&uuid_str).to_string()
}
