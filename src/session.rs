//! One UI component's live, editable view of a collection.
//!
//! A session wires a [`LocalCollectionView`] to the shared feed of its
//! collection and routes local moves through the [`ReorderCoordinator`]:
//! the view moves optimistically, the coordinator rewrites the store, and
//! the resulting events confirm the move. A failed reorder rolls the view
//! back to the last confirmed sequence.

use crate::model::{ItemId, ParentKey};
use crate::reorder::{ReorderCoordinator, ReorderError, ReorderOutcome};
use crate::subscription::{SubscriptionHandle, SubscriptionRegistry, Unsubscribed};
use crate::view::{LocalCollectionView, ViewError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Reorder(#[from] ReorderError),
}

pub struct CollectionSession {
    view: LocalCollectionView,
    coordinator: Arc<ReorderCoordinator>,
    registry: Arc<SubscriptionRegistry>,
    handle: Option<SubscriptionHandle>,
}

impl CollectionSession {
    /// Subscribe to `key` and load its current items.
    ///
    /// The subscription is made before the initial listing. Events that
    /// arrive while the listing is in flight are replayed over it, so a write
    /// that lands in between is never lost.
    pub async fn open(
        registry: Arc<SubscriptionRegistry>,
        coordinator: Arc<ReorderCoordinator>,
        key: ParentKey,
    ) -> Result<Self, SessionError> {
        let view = LocalCollectionView::with_store(key.clone(), Arc::clone(registry.store()));
        let handle = registry.subscribe(&key, Arc::new(view.clone()));
        let session = Self {
            view,
            coordinator,
            registry,
            handle: Some(handle),
        };

        // Dropping `session` on error releases the subscription.
        session.view.resync_from_store().await?;
        debug!(%key, items = session.view.items().len(), "Session opened");
        Ok(session)
    }

    #[must_use]
    pub fn key(&self) -> &ParentKey {
        self.view.key()
    }

    #[must_use]
    pub fn view(&self) -> &LocalCollectionView {
        &self.view
    }

    /// Move an item, showing the result immediately.
    ///
    /// On failure the optimistic edit is discarded and the error returned.
    pub async fn move_item(
        &self,
        item_id: &ItemId,
        target_index: i64,
    ) -> Result<ReorderOutcome, SessionError> {
        self.view.apply_optimistic(item_id, target_index)?;

        match self
            .coordinator
            .move_item(self.view.key(), item_id, target_index)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(key = %self.view.key(), %item_id, error = %e, "Move failed; rolling back");
                self.view.rollback();
                Err(e.into())
            }
        }
    }

    /// Release the subscription. The feed closes if this was its last one.
    ///
    /// Dropping a session releases it too; `close` reports the outcome.
    pub fn close(mut self) -> Unsubscribed {
        self.release().unwrap_or(Unsubscribed {
            remaining: 0,
            channel_closed: false,
        })
    }

    fn release(&mut self) -> Option<Unsubscribed> {
        let handle = self.handle.take()?;
        let released = self.registry.unsubscribe(handle);
        debug!(key = %self.view.key(), remaining = released.remaining, "Session closed");
        Some(released)
    }
}

impl Drop for CollectionSession {
    fn drop(&mut self) {
        self.release();
    }
}
