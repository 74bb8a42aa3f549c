//! Common test utilities

use async_trait::async_trait;
use ordersync::model::is_dense;
use ordersync::{
    ChangeEvent, EntityType, ItemId, LocalCollectionView, MemoryOrderStore, OrderStore,
    OrderedItem, ParentKey, StoreError,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify};

/// Create a temporary directory for testing
#[allow(dead_code)] // Test utility for integration tests
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Collection used by most tests.
pub fn questions() -> ParentKey {
    ParentKey::new(EntityType::Question, "module-1")
}

/// Append one item per name; the name is stored in the payload.
pub async fn seed(store: &dyn OrderStore, parent: &ParentKey, names: &[&str]) -> Vec<ItemId> {
    let mut ids = Vec::new();
    for name in names {
        let item = store
            .append(parent, json!({ "name": name }))
            .await
            .expect("Should append item");
        ids.push(item.id);
    }
    ids
}

pub fn names_of(items: &[OrderedItem]) -> Vec<String> {
    items
        .iter()
        .map(|i| i.payload["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn orders_of(items: &[OrderedItem]) -> Vec<i64> {
    items.iter().map(|i| i.order).collect()
}

pub async fn stored_names(store: &dyn OrderStore, parent: &ParentKey) -> Vec<String> {
    names_of(&store.list_siblings(parent).await.expect("Should list"))
}

#[allow(dead_code)] // Test utility for integration tests
pub async fn stored_orders(store: &dyn OrderStore, parent: &ParentKey) -> Vec<i64> {
    orders_of(&store.list_siblings(parent).await.expect("Should list"))
}

/// Wait until the view shows exactly `expected`, settled on orders `0..N`.
#[allow(dead_code)] // Test utility for integration tests
pub async fn wait_for_names(view: &LocalCollectionView, expected: &[&str]) {
    let mut rx = view.watch();
    let reached = tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|items| names_of(items) == expected && is_dense(items)),
    )
    .await;
    assert!(
        matches!(reached, Ok(Ok(_))),
        "view never reached {expected:?}, last seen {:?}",
        names_of(&view.items())
    );
}

/// Memory store with scripted `set_order` failures.
#[derive(Default)]
#[allow(dead_code)] // Test utility for integration tests
pub struct FlakyStore {
    pub inner: MemoryOrderStore,
    calls: AtomicUsize,
    pass_through: AtomicUsize,
    failures: Mutex<VecDeque<StoreError>>,
}

#[allow(dead_code)] // Test utility for integration tests
impl FlakyStore {
    /// Queue errors returned by the next `set_order` calls, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    /// Let `successful` calls through before the queued errors apply.
    pub fn fail_after(&self, successful: usize, errors: impl IntoIterator<Item = StoreError>) {
        self.pass_through.store(successful, Ordering::SeqCst);
        self.fail_next(errors);
    }

    pub fn set_order_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn violation(parent: &ParentKey, order: i64) -> StoreError {
        StoreError::ConstraintViolation {
            parent: parent.clone(),
            order,
            occupant: ItemId::from("concurrent-writer"),
        }
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn list_siblings(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError> {
        self.inner.list_siblings(parent).await
    }

    async fn get(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        self.inner.get(item_id).await
    }

    async fn set_order(
        &self,
        item_id: &ItemId,
        parent: &ParentKey,
        new_order: i64,
    ) -> Result<OrderedItem, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let passing = self
            .pass_through
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if passing {
            return self.inner.set_order(item_id, parent, new_order).await;
        }
        let injected = self.failures.lock().unwrap().pop_front();
        if let Some(error) = injected {
            return Err(error);
        }
        self.inner.set_order(item_id, parent, new_order).await
    }

    async fn append(
        &self,
        parent: &ParentKey,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, StoreError> {
        self.inner.append(parent, payload).await
    }

    async fn remove(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        self.inner.remove(item_id).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe_changes()
    }
}

/// Memory store whose next listing is held back until released.
///
/// The listing is taken when the call starts; `listed` fires at that point
/// and the result is only returned after `release`.
#[derive(Default)]
#[allow(dead_code)] // Test utility for integration tests
pub struct GatedListingStore {
    pub inner: MemoryOrderStore,
    armed: AtomicBool,
    listed: Notify,
    gate: Notify,
}

#[allow(dead_code)] // Test utility for integration tests
impl GatedListingStore {
    pub fn hold_next_listing(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn listing_taken(&self) {
        self.listed.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl OrderStore for GatedListingStore {
    async fn list_siblings(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError> {
        let snapshot = self.inner.list_siblings(parent).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.listed.notify_one();
            self.gate.notified().await;
        }
        snapshot
    }

    async fn get(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        self.inner.get(item_id).await
    }

    async fn set_order(
        &self,
        item_id: &ItemId,
        parent: &ParentKey,
        new_order: i64,
    ) -> Result<OrderedItem, StoreError> {
        self.inner.set_order(item_id, parent, new_order).await
    }

    async fn append(
        &self,
        parent: &ParentKey,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, StoreError> {
        self.inner.append(parent, payload).await
    }

    async fn remove(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        self.inner.remove(item_id).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe_changes()
    }
}
