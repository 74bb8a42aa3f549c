//! Core data model for ordered sibling collections.
//!
//! An [`OrderedItem`] belongs to exactly one collection, identified by its
//! [`ParentKey`]. Within one collection the `order` values are unique; the
//! store enforces that and the reorder coordinator keeps them dense.

mod key;

pub use key::{EntityType, ParentKey, ParseKeyError};

use crate::utils::now_iso;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique identifier of an ordered item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single entry of an ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedItem {
    pub id: ItemId,
    pub parent: ParentKey,
    pub order: i64,
    /// Owned by the CRUD collaborators; never inspected here.
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderedItem {
    /// Build a new item stamped with the current time.
    #[must_use]
    pub fn new(id: ItemId, parent: ParentKey, order: i64, payload: serde_json::Value) -> Self {
        let now = now_iso();
        Self {
            id,
            parent,
            order,
            payload,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Kind of mutation carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
            ChangeKind::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// Notification emitted for every committed write.
///
/// The item is the post-write row, or the deleted row for `Removed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub item: OrderedItem,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(kind: ChangeKind, item: OrderedItem) -> Self {
        Self { kind, item }
    }

    #[must_use]
    pub fn parent(&self) -> &ParentKey {
        &self.item.parent
    }
}

/// Whether the orders of `items` are exactly `{0, .., N-1}`.
#[must_use]
pub fn is_dense(items: &[OrderedItem]) -> bool {
    let mut orders: Vec<i64> = items.iter().map(|i| i.order).collect();
    orders.sort_unstable();
    orders
        .iter()
        .zip(0_i64..)
        .all(|(order, expected)| *order == expected)
}
