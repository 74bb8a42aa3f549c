//! In-process order store.
//!
//! Rows and the `(parent, order)` unique index live behind one async mutex,
//! so every write is atomic and conditional. Change events are published
//! while the lock is held, which keeps the broadcast order identical to the
//! commit order.

use super::{next_append_order, sort_by_order, OrderStore, StoreError, DEFAULT_CHANGE_CAPACITY};
use crate::model::{ChangeEvent, ChangeKind, ItemId, OrderedItem, ParentKey};
use crate::utils::now_iso;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct Tables {
    items: HashMap<ItemId, OrderedItem>,
    slots: HashMap<(ParentKey, i64), ItemId>,
}

impl Tables {
    fn occupant(&self, parent: &ParentKey, order: i64) -> Option<&ItemId> {
        self.slots.get(&(parent.clone(), order))
    }

    fn siblings(&self, parent: &ParentKey) -> Vec<OrderedItem> {
        let mut items: Vec<OrderedItem> = self
            .items
            .values()
            .filter(|i| &i.parent == parent)
            .cloned()
            .collect();
        sort_by_order(&mut items);
        items
    }
}

pub struct MemoryOrderStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANGE_CAPACITY)
    }

    /// Create a store whose change channel buffers `capacity` events per
    /// receiver before slow receivers start lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
        }
    }

    /// Number of live change receivers.
    #[must_use]
    pub fn change_receivers(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, kind: ChangeKind, item: &OrderedItem) {
        if self.changes.send(ChangeEvent::new(kind, item.clone())).is_err() {
            trace!(item_id = %item.id, "No change receivers");
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list_siblings(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.siblings(parent))
    }

    async fn get(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .items
            .get(item_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))
    }

    async fn set_order(
        &self,
        item_id: &ItemId,
        parent: &ParentKey,
        new_order: i64,
    ) -> Result<OrderedItem, StoreError> {
        let mut tables = self.tables.lock().await;

        let old_order = match tables.items.get(item_id) {
            Some(item) if &item.parent == parent => item.order,
            _ => return Err(StoreError::not_found(item_id.as_str())),
        };

        if let Some(occupant) = tables.occupant(parent, new_order) {
            if occupant != item_id {
                return Err(StoreError::ConstraintViolation {
                    parent: parent.clone(),
                    order: new_order,
                    occupant: occupant.clone(),
                });
            }
        }

        tables.slots.remove(&(parent.clone(), old_order));
        tables
            .slots
            .insert((parent.clone(), new_order), item_id.clone());

        let Some(item) = tables.items.get_mut(item_id) else {
            return Err(StoreError::not_found(item_id.as_str()));
        };
        item.order = new_order;
        item.updated_at = now_iso();
        let updated = item.clone();

        debug!(item_id = %item_id, %parent, old_order, new_order, "Order updated");
        self.publish(ChangeKind::Updated, &updated);
        Ok(updated)
    }

    async fn append(
        &self,
        parent: &ParentKey,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, StoreError> {
        let mut tables = self.tables.lock().await;
        let order = next_append_order(&tables.siblings(parent));
        let item = OrderedItem::new(ItemId::generate(), parent.clone(), order, payload);

        tables
            .slots
            .insert((parent.clone(), order), item.id.clone());
        tables.items.insert(item.id.clone(), item.clone());

        debug!(item_id = %item.id, %parent, order, "Item appended");
        self.publish(ChangeKind::Inserted, &item);
        Ok(item)
    }

    async fn remove(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .items
            .remove(item_id)
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))?;
        tables.slots.remove(&(item.parent.clone(), item.order));

        debug!(item_id = %item_id, parent = %item.parent, order = item.order, "Item removed");
        self.publish(ChangeKind::Removed, &item);
        Ok(item)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
