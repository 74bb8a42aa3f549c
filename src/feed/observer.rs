use super::FeedStatus;
use crate::model::ChangeEvent;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of feed events and status changes.
///
/// Callbacks run on the feed's pump task. They must not subscribe or
/// unsubscribe on the same feed from inside a callback.
pub trait ChangeObserver: Send + Sync {
    fn on_event(&self, event: &ChangeEvent);

    /// Status callback. The default ignores status changes.
    fn on_status(&self, _status: FeedStatus) {}
}

/// Adapter turning a closure into an observer.
pub struct FnObserver<F>(pub F);

impl<F> ChangeObserver for FnObserver<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_event(&self, event: &ChangeEvent) {
        (self.0)(event);
    }
}

#[derive(Default)]
struct Entries {
    next_id: u64,
    observers: BTreeMap<u64, Arc<dyn ChangeObserver>>,
}

/// Observers of one feed, dispatched in subscription order.
///
/// Dispatch holds the lock, which is what makes removal synchronous: once
/// `remove` returns, no in-flight dispatch can still reach the observer.
#[derive(Default)]
pub(crate) struct ObserverSet {
    entries: Mutex<Entries>,
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.len())
            .finish()
    }
}

impl ObserverSet {
    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, observer: Arc<dyn ChangeObserver>) -> u64 {
        let mut entries = self.entries();
        let id = entries.next_id;
        entries.next_id = id.wrapping_add(1);
        entries.observers.insert(id, observer);
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        self.entries().observers.remove(&id).is_some()
    }

    pub(crate) fn clear(&self) {
        self.entries().observers.clear();
    }

    /// Detach every observer, telling each that the feed is closed.
    pub(crate) fn close(&self) {
        let mut entries = self.entries();
        for observer in std::mem::take(&mut entries.observers).into_values() {
            observer.on_status(FeedStatus::Closed);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().observers.len()
    }

    pub(crate) fn dispatch(&self, event: &ChangeEvent) {
        for observer in self.entries().observers.values() {
            observer.on_event(event);
        }
    }

    pub(crate) fn notify_status(&self, status: FeedStatus) {
        for observer in self.entries().observers.values() {
            observer.on_status(status);
        }
    }
}
