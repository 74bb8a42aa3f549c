//! Per-observer ordered sequence of one collection.
//!
//! A view keeps two sequences. The authoritative one only changes through
//! feed events and full resyncs. The display one additionally carries
//! optimistic local moves and is what the UI renders. Both are sorted by
//! `(order, id)`.
//!
//! Reconciliation is idempotent per event and last-event-wins per item.
//! Every reorder ends by rewriting each sibling's order, so once all of a
//! reorder's events have arrived the view holds the final order regardless
//! of how they interleaved. Intermediate offset orders may render briefly.
//!
//! A store listing can be older than events that arrive while it is in
//! flight. Those events are buffered and replayed over the listing once it
//! lands, so a resync never rolls the view back past a delivered event.

mod error;

pub use error::ViewError;

use crate::feed::{ChangeObserver, FeedStatus};
use crate::model::{ChangeEvent, ChangeKind, ItemId, OrderedItem, ParentKey};
use crate::reorder::plan::{clamp_index, slot};
use crate::store::{sort_by_order, OrderStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct ViewState {
    authoritative: Vec<OrderedItem>,
    display: Vec<OrderedItem>,
    stale: bool,
    /// Store listings currently in flight.
    resyncs: usize,
    /// Events delivered while `resyncs > 0`, in delivery order.
    pending: Vec<ChangeEvent>,
}

impl ViewState {
    fn apply(&mut self, event: &ChangeEvent) -> bool {
        let confirmed = apply_event(&mut self.authoritative, event);
        let displayed = apply_event(&mut self.display, event);
        confirmed || displayed
    }
}

struct ViewInner {
    key: ParentKey,
    state: Mutex<ViewState>,
    render: watch::Sender<Vec<OrderedItem>>,
    store: Option<Arc<dyn OrderStore>>,
}

/// Cheap-to-clone handle; clones share the same sequence.
#[derive(Clone)]
pub struct LocalCollectionView {
    inner: Arc<ViewInner>,
}

impl LocalCollectionView {
    /// A detached view. It cannot resync by itself after a degraded feed.
    #[must_use]
    pub fn new(key: ParentKey) -> Self {
        Self::build(key, None)
    }

    /// A view that reloads from `store` whenever its feed degrades.
    #[must_use]
    pub fn with_store(key: ParentKey, store: Arc<dyn OrderStore>) -> Self {
        Self::build(key, Some(store))
    }

    fn build(key: ParentKey, store: Option<Arc<dyn OrderStore>>) -> Self {
        let (render, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(ViewInner {
                key,
                state: Mutex::new(ViewState::default()),
                render,
                store,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ViewState) {
        self.inner.render.send_replace(state.display.clone());
    }

    #[must_use]
    pub fn key(&self) -> &ParentKey {
        &self.inner.key
    }

    /// Render-ready sequence, optimistic edits included.
    #[must_use]
    pub fn items(&self) -> Vec<OrderedItem> {
        self.state().display.clone()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.state().display.iter().map(|i| i.id.clone()).collect()
    }

    /// Last sequence confirmed by the store.
    #[must_use]
    pub fn confirmed_items(&self) -> Vec<OrderedItem> {
        self.state().authoritative.clone()
    }

    /// Whether events may have been missed since the last resync.
    #[must_use]
    pub fn needs_resync(&self) -> bool {
        self.state().stale
    }

    /// Subscribe to every change of the display sequence.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<OrderedItem>> {
        self.inner.render.subscribe()
    }

    /// Move `item_id` locally to `target_index` (clamped) before the store
    /// confirms it. Display orders are renumbered densely. Returns `false`
    /// when the item already sits at that index.
    pub fn apply_optimistic(&self, item_id: &ItemId, target_index: i64) -> Result<bool, ViewError> {
        let mut state = self.state();
        let from = state
            .display
            .iter()
            .position(|i| &i.id == item_id)
            .ok_or_else(|| ViewError::NotFound(item_id.to_string()))?;
        let to = clamp_index(target_index, state.display.len());
        if from == to {
            return Ok(false);
        }

        let moved = state.display.remove(from);
        state.display.insert(to, moved);
        for (index, item) in state.display.iter_mut().enumerate() {
            item.order = slot(index);
        }
        debug!(key = %self.inner.key, %item_id, from, to, "Optimistic move applied");
        self.publish(&state);
        Ok(true)
    }

    /// Merge one authoritative event into both sequences.
    ///
    /// Events for other collections are ignored.
    pub fn reconcile(&self, event: &ChangeEvent) {
        if event.parent() != &self.inner.key {
            trace!(key = %self.inner.key, parent = %event.parent(), "Ignoring foreign event");
            return;
        }
        let mut state = self.state();
        if state.resyncs > 0 {
            state.pending.push(event.clone());
        }
        if state.apply(event) {
            trace!(key = %self.inner.key, kind = %event.kind, item_id = %event.item.id, "Event reconciled");
            self.publish(&state);
        }
    }

    /// Drop optimistic edits and show the last confirmed sequence again.
    pub fn rollback(&self) {
        let mut state = self.state();
        state.display = state.authoritative.clone();
        debug!(key = %self.inner.key, "Optimistic state rolled back");
        self.publish(&state);
    }

    /// Replace both sequences with a full listing from the store.
    pub fn resync(&self, mut items: Vec<OrderedItem>) {
        items.retain(|i| i.parent == self.inner.key);
        sort_by_order(&mut items);
        let mut state = self.state();
        state.authoritative.clone_from(&items);
        state.display = items;
        state.stale = false;
        debug!(key = %self.inner.key, count = state.display.len(), "View resynced");
        self.publish(&state);
    }

    /// Reload the collection from the attached store.
    ///
    /// Events delivered while the listing is in flight are replayed over it.
    pub async fn resync_from_store(&self) -> Result<(), ViewError> {
        let store = self.inner.store.as_ref().ok_or(ViewError::Detached)?;
        {
            let mut state = self.state();
            state.resyncs = state.resyncs.saturating_add(1);
        }
        let listed = store.list_siblings(&self.inner.key).await;

        let mut state = self.state();
        state.resyncs = state.resyncs.saturating_sub(1);
        let mut items = match listed {
            Ok(items) => items,
            Err(e) => {
                if state.resyncs == 0 {
                    state.pending.clear();
                }
                return Err(e.into());
            }
        };
        items.retain(|i| i.parent == self.inner.key);
        sort_by_order(&mut items);
        state.authoritative.clone_from(&items);
        state.display = items;

        let pending = if state.resyncs == 0 {
            std::mem::take(&mut state.pending)
        } else {
            state.pending.clone()
        };
        for event in &pending {
            state.apply(event);
        }
        state.stale = false;
        debug!(
            key = %self.inner.key,
            count = state.display.len(),
            replayed = pending.len(),
            "View resynced from store"
        );
        self.publish(&state);
        Ok(())
    }

    fn mark_stale(&self) {
        self.state().stale = true;
        if self.inner.store.is_none() {
            warn!(key = %self.inner.key, "Feed degraded on a detached view; resync required");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.inner.key, "No runtime to resync on; view stays stale");
            return;
        };
        let view = self.clone();
        runtime.spawn(async move {
            if let Err(e) = view.resync_from_store().await {
                warn!(key = %view.inner.key, error = %e, "Resync after degraded feed failed");
            }
        });
    }
}

impl ChangeObserver for LocalCollectionView {
    fn on_event(&self, event: &ChangeEvent) {
        self.reconcile(event);
    }

    fn on_status(&self, status: FeedStatus) {
        if status == FeedStatus::Degraded {
            self.mark_stale();
        }
    }
}

/// Apply `event` to a sorted sequence. Returns whether it changed.
fn apply_event(items: &mut Vec<OrderedItem>, event: &ChangeEvent) -> bool {
    let position = items.iter().position(|i| i.id == event.item.id);
    match (event.kind, position) {
        (ChangeKind::Inserted, Some(_)) | (ChangeKind::Removed, None) => return false,
        (ChangeKind::Inserted | ChangeKind::Updated, None) => items.push(event.item.clone()),
        (ChangeKind::Updated, Some(index)) => {
            let Some(existing) = items.get_mut(index) else {
                return false;
            };
            if *existing == event.item {
                return false;
            }
            *existing = event.item.clone();
        }
        (ChangeKind::Removed, Some(index)) => {
            items.remove(index);
            return true;
        }
    }
    sort_by_order(items);
    true
}
