//! Persistence facade over sibling collections.
//!
//! An [`OrderStore`] is the single source of truth for `(parent, order)`
//! pairs. Backends must reject any write that would leave two items of the
//! same parent on the same order, and must publish one [`ChangeEvent`] per
//! committed write on the channel returned by
//! [`OrderStore::subscribe_changes`].

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileOrderStore;
pub use memory::MemoryOrderStore;

use crate::model::{ChangeEvent, ItemId, OrderedItem, ParentKey};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Default capacity of a store's change broadcast channel.
pub const DEFAULT_CHANGE_CAPACITY: usize = 1024;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All items of `parent`, ascending by order. Empty when none exist.
    async fn list_siblings(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError>;

    /// Look up a single item by id.
    async fn get(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError>;

    /// Conditional write of one item's order.
    ///
    /// Fails with [`StoreError::ConstraintViolation`] when another item of
    /// `parent` currently holds `new_order`.
    async fn set_order(
        &self,
        item_id: &ItemId,
        parent: &ParentKey,
        new_order: i64,
    ) -> Result<OrderedItem, StoreError>;

    /// Create a new item at the end of `parent`.
    async fn append(
        &self,
        parent: &ParentKey,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, StoreError>;

    /// Delete an item. Remaining siblings are not renumbered.
    async fn remove(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError>;

    /// Receiver for every change committed after this call.
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Order assigned to a newly appended item.
///
/// This is the sibling count, unless gaps left by removals mean that slot is
/// still taken, in which case the item goes after the current maximum.
pub(crate) fn next_append_order(siblings: &[OrderedItem]) -> i64 {
    let count = i64::try_from(siblings.len()).unwrap_or(i64::MAX);
    let after_max = siblings
        .iter()
        .map(|i| i.order)
        .max()
        .map_or(0, |max| max.saturating_add(1));
    count.max(after_max)
}

pub(crate) fn sort_by_order(items: &mut [OrderedItem]) {
    items.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}
