//! Push channel scoped to one collection.
//!
//! A [`ChangeFeedClient`] pumps the store's change broadcast on a tokio task,
//! keeps only the events of its [`ParentKey`], and hands them to every
//! registered [`ChangeObserver`]. Delivery is at-least-once: observers must
//! tolerate duplicates. When the pump falls behind the broadcast buffer the
//! feed reports [`FeedStatus::Degraded`], and observers must resync from the
//! store instead of trusting the deltas they saw.

mod error;
mod observer;

pub use error::FeedError;
pub use observer::{ChangeObserver, FnObserver};

use crate::model::{ChangeEvent, ParentKey};
use observer::ObserverSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Connection health of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Active,
    /// Events may have been dropped; a full resync is required.
    Degraded,
    Closed,
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Active => "active",
            FeedStatus::Degraded => "degraded",
            FeedStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Cancellation handle returned by [`ChangeFeedClient::subscribe`].
#[derive(Debug)]
#[must_use = "dropping the handle leaves the observer subscribed; call cancel()"]
pub struct FeedSubscription {
    id: u64,
    observers: Arc<ObserverSet>,
}

impl FeedSubscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detach the observer. Once this returns it is never called again.
    pub fn cancel(self) {
        self.observers.remove(self.id);
    }
}

pub struct ChangeFeedClient {
    key: ParentKey,
    observers: Arc<ObserverSet>,
    status: watch::Receiver<FeedStatus>,
    shutdown: watch::Sender<bool>,
    pump: JoinHandle<()>,
}

impl ChangeFeedClient {
    /// Start a feed for `key` over a store change receiver.
    ///
    /// The receiver must already be subscribed so nothing committed after
    /// this call is missed. Must be called inside a tokio runtime.
    #[must_use]
    pub fn connect(key: ParentKey, changes: broadcast::Receiver<ChangeEvent>) -> Self {
        let observers = Arc::new(ObserverSet::default());
        let (status_tx, status) = watch::channel(FeedStatus::Connecting);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let pump = tokio::spawn(pump(
            key.clone(),
            changes,
            Arc::clone(&observers),
            status_tx,
            shutdown_rx,
        ));
        debug!(%key, "Change feed connecting");

        Self {
            key,
            observers,
            status,
            shutdown,
            pump,
        }
    }

    #[must_use]
    pub fn key(&self) -> &ParentKey {
        &self.key
    }

    /// Register an observer for events and status changes.
    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) -> FeedSubscription {
        let id = self.observers.insert(observer);
        trace!(key = %self.key, subscription = id, "Observer subscribed");
        FeedSubscription {
            id,
            observers: Arc::clone(&self.observers),
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn status(&self) -> FeedStatus {
        *self.status.borrow()
    }

    /// Watch status transitions.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pump.is_finished() || self.status() == FeedStatus::Closed
    }

    /// Stop the pump and drop every observer.
    ///
    /// Each observer still attached hears [`FeedStatus::Closed`] once. No
    /// observer is called after this returns.
    pub fn close(&self) {
        self.observers.close();
        self.shutdown.send_replace(true);
    }
}

impl Drop for ChangeFeedClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(
    key: ParentKey,
    mut changes: broadcast::Receiver<ChangeEvent>,
    observers: Arc<ObserverSet>,
    status: watch::Sender<FeedStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let set_status = |next: FeedStatus| {
        let previous = status.send_replace(next);
        if previous != next {
            debug!(%key, %previous, %next, "Feed status changed");
            observers.notify_status(next);
        }
    };

    set_status(FeedStatus::Active);
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            received = changes.recv() => received.map_err(FeedError::from),
        };

        match received {
            Ok(event) if event.parent() == &key => {
                if *status.borrow() == FeedStatus::Degraded {
                    set_status(FeedStatus::Active);
                }
                observers.dispatch(&event);
            }
            Ok(_) => {}
            Err(FeedError::ChannelDegraded(missed)) => {
                warn!(%key, missed, "Change feed lagged; observers must resync");
                set_status(FeedStatus::Degraded);
            }
            Err(FeedError::Closed) => {
                info!(%key, "Change source closed");
                break;
            }
        }
    }

    set_status(FeedStatus::Closed);
    observers.clear();
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod feed_tests;
