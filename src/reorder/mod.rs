//! Two-phase reindexing of sibling collections.
//!
//! The store rejects any write onto an order another sibling still holds,
//! so a move cannot be written in place. Instead every sibling is first
//! displaced into a temporary range above all live orders (phase A), then
//! settled onto its final dense slot `0..N` (phase B). Each write is
//! individually atomic; there is no transaction spanning the whole move.
//!
//! A failure between the phases leaves the collection in the temporary
//! range. The next successful reorder, or [`ReorderCoordinator::compact`],
//! settles it again.

mod error;
mod locks;
pub mod plan;

pub use error::ReorderError;
pub use locks::ParentLocks;

use crate::config::ReorderSettings;
use crate::metrics::{generate_operation_id, OperationTimer};
use crate::model::{is_dense, ItemId, OrderedItem, ParentKey};
use crate::store::{OrderStore, StoreError};
use plan::{displacement_base, plan_move, slot};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Result of a successful [`ReorderCoordinator::move_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The item already sat at the requested (clamped) index. Nothing was written.
    Unchanged { index: usize },
    Moved { from: usize, to: usize, writes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Displace,
    Settle,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Displace => f.write_str("displace"),
            Phase::Settle => f.write_str("settle"),
        }
    }
}

pub struct ReorderCoordinator {
    store: Arc<dyn OrderStore>,
    settings: ReorderSettings,
    locks: ParentLocks,
}

impl ReorderCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, settings: ReorderSettings) -> Self {
        Self {
            store,
            settings,
            locks: ParentLocks::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &ReorderSettings {
        &self.settings
    }

    /// Move `item_id` to `target_index` within `parent`.
    ///
    /// The index is clamped into `[0, N-1]`. Moving an item onto its current
    /// index performs no writes and emits no events. On success the orders
    /// of `parent` are exactly `0..N`.
    pub async fn move_item(
        &self,
        parent: &ParentKey,
        item_id: &ItemId,
        target_index: i64,
    ) -> Result<ReorderOutcome, ReorderError> {
        let operation_id = generate_operation_id();
        let span = tracing::info_span!("move_item", %operation_id, %parent, %item_id, target_index);
        let _timer = OperationTimer::new("move_item", parent.to_string());

        self.guarded(parent, self.move_unlocked(parent, item_id, target_index))
            .instrument(span)
            .await
    }

    /// Create an item and place it at `position`.
    ///
    /// The item is appended first and then moved with the same two-phase
    /// rewrite, so the uniqueness constraint holds throughout.
    pub async fn insert_at(
        &self,
        parent: &ParentKey,
        position: i64,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, ReorderError> {
        let appended = self
            .store
            .append(parent, payload)
            .await
            .map_err(|e| ReorderError::failed(parent, format!("append failed: {e}")))?;
        self.move_item(parent, &appended.id, position).await?;
        self.store
            .get(&appended.id)
            .await
            .map_err(|e| ReorderError::failed(parent, format!("reload failed: {e}")))
    }

    /// Re-densify `parent` if its orders have gaps or sit in the offset range.
    ///
    /// The current relative order is kept. Returns the number of writes,
    /// which is zero for an already dense collection.
    pub async fn compact(&self, parent: &ParentKey) -> Result<usize, ReorderError> {
        let _timer = OperationTimer::new("compact", parent.to_string());
        self.guarded(parent, async {
            let siblings = self.list(parent).await?;
            if is_dense(&siblings) {
                debug!(%parent, "Collection already dense");
                return Ok(0);
            }
            let target: Vec<ItemId> = siblings.iter().map(|i| i.id.clone()).collect();
            let writes = self.rewrite(parent, &siblings, &target).await?;
            info!(%parent, writes, "Collection compacted");
            Ok::<usize, ReorderError>(writes)
        })
        .await
    }

    /// Run `operation` under the per-collection lock (when enabled) and the
    /// configured operation timeout. Waiting for the lock counts toward the
    /// timeout.
    async fn guarded<T>(
        &self,
        parent: &ParentKey,
        operation: impl Future<Output = Result<T, ReorderError>>,
    ) -> Result<T, ReorderError> {
        let timeout = self.settings.operation_timeout();
        let work = async {
            let _guard = if self.settings.serialize_reorders {
                Some(self.locks.acquire(parent).await)
            } else {
                None
            };
            operation.await
        };

        tokio::time::timeout(timeout, work).await.unwrap_or_else(|_| {
            warn!(%parent, timeout_ms = %timeout.as_millis(), "Reorder timed out");
            Err(ReorderError::failed(
                parent,
                format!("timed out after {}ms", timeout.as_millis()),
            ))
        })
    }

    async fn move_unlocked(
        &self,
        parent: &ParentKey,
        item_id: &ItemId,
        target_index: i64,
    ) -> Result<ReorderOutcome, ReorderError> {
        let siblings = self.list(parent).await?;
        let plan = plan_move(&siblings, item_id, target_index)
            .ok_or_else(|| ReorderError::NotFound(item_id.to_string()))?;

        if plan.is_noop() {
            debug!(index = plan.from, "Item already at target index");
            return Ok(ReorderOutcome::Unchanged { index: plan.from });
        }

        let writes = self.rewrite(parent, &siblings, &plan.target).await?;
        info!(from = plan.from, to = plan.to, writes, "Item moved");
        Ok(ReorderOutcome::Moved {
            from: plan.from,
            to: plan.to,
            writes,
        })
    }

    async fn list(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, ReorderError> {
        self.store
            .list_siblings(parent)
            .await
            .map_err(|e| ReorderError::failed(parent, format!("listing siblings failed: {e}")))
    }

    /// Displace every sibling, then settle `target` onto `0..N`.
    async fn rewrite(
        &self,
        parent: &ParentKey,
        current: &[OrderedItem],
        target: &[ItemId],
    ) -> Result<usize, ReorderError> {
        let base = displacement_base(self.settings.offset, current);
        debug!(%parent, base, count = current.len(), "Phase A: displacing siblings");
        for (index, item) in current.iter().enumerate() {
            let order = base.saturating_add(slot(index));
            self.write_with_retry(parent, &item.id, order, Phase::Displace)
                .await?;
        }

        debug!(%parent, count = target.len(), "Phase B: settling siblings");
        for (index, id) in target.iter().enumerate() {
            self.write_with_retry(parent, id, slot(index), Phase::Settle)
                .await?;
        }

        Ok(current.len().saturating_add(target.len()))
    }

    /// One conditional write, retried once on a constraint violation.
    async fn write_with_retry(
        &self,
        parent: &ParentKey,
        item_id: &ItemId,
        order: i64,
        phase: Phase,
    ) -> Result<(), ReorderError> {
        let first = match self.store.set_order(item_id, parent, order).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        if !first.is_constraint_violation() {
            return Err(write_failure(parent, item_id, order, phase, &first));
        }

        warn!(%parent, %item_id, order, %phase, error = %first, "Constraint violation, retrying once");
        self.store
            .set_order(item_id, parent, order)
            .await
            .map(|_| ())
            .map_err(|e| write_failure(parent, item_id, order, phase, &e))
    }
}

fn write_failure(
    parent: &ParentKey,
    item_id: &ItemId,
    order: i64,
    phase: Phase,
    error: &StoreError,
) -> ReorderError {
    warn!(%parent, %item_id, order, %phase, %error, "Reorder aborted");
    ReorderError::failed(
        parent,
        format!("{phase} write of {item_id} to {order} failed: {error}"),
    )
}
