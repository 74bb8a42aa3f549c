//! Durable order store backed by one JSON document per collection.
//!
//! Layout: `<root>/<entity>/<parent-id>.json`. All writes are serialized by a
//! store-wide lock and land through an atomic rename, so the uniqueness check
//! and the write it guards cannot interleave with another writer in this
//! process.

use super::{next_append_order, sort_by_order, OrderStore, StoreError, DEFAULT_CHANGE_CAPACITY};
use crate::model::{ChangeEvent, ChangeKind, EntityType, ItemId, OrderedItem, ParentKey};
use crate::utils::{now_iso, write_json_atomic};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, trace, warn};

const DOCUMENT_EXTENSION: &str = "json";

/// On-disk shape of one collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionDocument {
    items: Vec<OrderedItem>,
}

pub struct FileOrderStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl FileOrderStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_CHANGE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, parent: &ParentKey) -> Result<PathBuf, StoreError> {
        validate_parent_id(&parent.id)?;
        Ok(self
            .root
            .join(parent.entity.as_str())
            .join(format!("{}.{DOCUMENT_EXTENSION}", parent.id)))
    }

    async fn load(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError> {
        let path = self.document_path(parent)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        let document: CollectionDocument = serde_json::from_str(&content)?;
        let mut items = document.items;
        sort_by_order(&mut items);
        Ok(items)
    }

    async fn save(&self, parent: &ParentKey, items: Vec<OrderedItem>) -> Result<(), StoreError> {
        let path = self.document_path(parent)?;
        write_json_atomic(&path, &CollectionDocument { items }).await?;
        Ok(())
    }

    /// Scan every collection document for `item_id`.
    async fn locate(&self, item_id: &ItemId) -> Result<Option<ParentKey>, StoreError> {
        for entity in EntityType::ALL {
            let dir = self.root.join(entity.as_str());
            if !dir.exists() {
                continue;
            }
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Some(parent_id) = document_parent_id(&path) else {
                    continue;
                };
                let parent = ParentKey::new(entity, parent_id);
                match self.load(&parent).await {
                    Ok(items) if items.iter().any(|i| &i.id == item_id) => {
                        return Ok(Some(parent));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable collection"),
                }
            }
        }
        Ok(None)
    }

    fn publish(&self, kind: ChangeKind, item: &OrderedItem) {
        if self.changes.send(ChangeEvent::new(kind, item.clone())).is_err() {
            trace!(item_id = %item.id, "No change receivers");
        }
    }
}

fn document_parent_id(path: &Path) -> Option<String> {
    let is_document = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
    if !is_document {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToString::to_string)
}

/// Parent ids become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_parent_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(id.to_string()))
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn list_siblings(&self, parent: &ParentKey) -> Result<Vec<OrderedItem>, StoreError> {
        self.load(parent).await
    }

    async fn get(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        let parent = self
            .locate(item_id)
            .await?
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))?;
        self.load(&parent)
            .await?
            .into_iter()
            .find(|i| &i.id == item_id)
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))
    }

    async fn set_order(
        &self,
        item_id: &ItemId,
        parent: &ParentKey,
        new_order: i64,
    ) -> Result<OrderedItem, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load(parent).await?;

        if !items.iter().any(|i| &i.id == item_id) {
            return Err(StoreError::not_found(item_id.as_str()));
        }
        if let Some(occupant) = items
            .iter()
            .find(|i| i.order == new_order && &i.id != item_id)
        {
            return Err(StoreError::ConstraintViolation {
                parent: parent.clone(),
                order: new_order,
                occupant: occupant.id.clone(),
            });
        }

        let item = items
            .iter_mut()
            .find(|i| &i.id == item_id)
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))?;
        let old_order = item.order;
        item.order = new_order;
        item.updated_at = now_iso();
        let updated = item.clone();

        self.save(parent, items).await?;
        debug!(item_id = %item_id, %parent, old_order, new_order, "Order updated");
        self.publish(ChangeKind::Updated, &updated);
        Ok(updated)
    }

    async fn append(
        &self,
        parent: &ParentKey,
        payload: serde_json::Value,
    ) -> Result<OrderedItem, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load(parent).await?;
        let order = next_append_order(&items);
        let item = OrderedItem::new(ItemId::generate(), parent.clone(), order, payload);
        items.push(item.clone());

        self.save(parent, items).await?;
        debug!(item_id = %item.id, %parent, order, "Item appended");
        self.publish(ChangeKind::Inserted, &item);
        Ok(item)
    }

    async fn remove(&self, item_id: &ItemId) -> Result<OrderedItem, StoreError> {
        let _guard = self.write_lock.lock().await;
        let parent = self
            .locate(item_id)
            .await?
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))?;
        let mut items = self.load(&parent).await?;
        let position = items
            .iter()
            .position(|i| &i.id == item_id)
            .ok_or_else(|| StoreError::not_found(item_id.as_str()))?;
        let removed = items.remove(position);

        self.save(&parent, items).await?;
        debug!(item_id = %item_id, %parent, order = removed.order, "Item removed");
        self.publish(ChangeKind::Removed, &removed);
        Ok(removed)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn key(id: &str) -> ParentKey {
        ParentKey::new(EntityType::Question, id)
    }

    #[tokio::test]
    async fn test_list_missing_collection_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp.path());
        assert!(store.list_siblings(&key("m1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_documents_persist_across_instances() {
        let temp = TempDir::new().unwrap();
        let first = FileOrderStore::new(temp.path());
        let a = first.append(&key("m1"), json!({"text": "a"})).await.unwrap();
        first.append(&key("m1"), json!({"text": "b"})).await.unwrap();

        assert!(temp.path().join("question").join("m1.json").exists());

        let second = FileOrderStore::new(temp.path());
        let items = second.list_siblings(&key("m1")).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, a.id);
        assert_eq!(items[0].payload["text"], "a");
        assert_eq!(second.get(&a.id).await.unwrap().order, 0);
    }

    #[tokio::test]
    async fn test_invalid_parent_id_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp.path());
        let err = store
            .append(&key("../escape"), json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_set_order_constraint_violation() {
        let temp = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp.path());
        let a = store.append(&key("m1"), json!(null)).await.unwrap();
        store.append(&key("m1"), json!(null)).await.unwrap();

        let err = store.set_order(&a.id, &key("m1"), 1).await.unwrap_err();
        assert!(err.is_constraint_violation());

        // Unchanged on disk
        let reloaded = FileOrderStore::new(temp.path());
        assert_eq!(reloaded.get(&a.id).await.unwrap().order, 0);
    }

    #[tokio::test]
    async fn test_remove_finds_item_across_entities() {
        let temp = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp.path());
        store
            .append(&ParentKey::new(EntityType::Module, "w1"), json!(null))
            .await
            .unwrap();
        let option = store
            .append(&ParentKey::new(EntityType::AnswerOption, "q1"), json!(null))
            .await
            .unwrap();

        let removed = store.remove(&option.id).await.unwrap();
        assert_eq!(removed.parent.entity, EntityType::AnswerOption);
        assert!(matches!(
            store.remove(&option.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
