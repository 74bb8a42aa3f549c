//! Reference-counted sharing of change feeds.
//!
//! Every observer of a collection goes through the registry, which keeps at
//! most one [`ChangeFeedClient`] per [`ParentKey`]. The feed is created by
//! the first subscription and torn down exactly when the last one leaves, so
//! a reorder's event burst is received once per collection rather than once
//! per observing component.

use crate::feed::{ChangeFeedClient, ChangeObserver, FeedStatus, FeedSubscription};
use crate::model::ParentKey;
use crate::store::OrderStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Proof of one registry subscription. Consumed by
/// [`SubscriptionRegistry::unsubscribe`], so it cannot be released twice.
#[derive(Debug)]
#[must_use = "the subscription stays counted until passed to unsubscribe()"]
pub struct SubscriptionHandle {
    key: ParentKey,
    generation: u64,
    subscription: FeedSubscription,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn key(&self) -> &ParentKey {
        &self.key
    }
}

/// Result of [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsubscribed {
    /// Subscriptions still attached to the collection.
    pub remaining: usize,
    /// Whether this call tore the feed down.
    pub channel_closed: bool,
}

struct Channel {
    feed: ChangeFeedClient,
    refs: usize,
    /// Distinguishes this feed from earlier ones opened for the same key.
    generation: u64,
}

pub struct SubscriptionRegistry {
    store: Arc<dyn OrderStore>,
    channels: Mutex<HashMap<ParentKey, Channel>>,
    next_generation: AtomicU64,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            channels: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<ParentKey, Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `observer` to the feed of `key`, opening the feed if this is
    /// the first subscription. Must be called inside a tokio runtime.
    pub fn subscribe(&self, key: &ParentKey, observer: Arc<dyn ChangeObserver>) -> SubscriptionHandle {
        let mut channels = self.channels();
        let channel = channels.entry(key.clone()).or_insert_with(|| {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            info!(%key, generation, "Opening change feed");
            Channel {
                feed: ChangeFeedClient::connect(key.clone(), self.store.subscribe_changes()),
                refs: 0,
                generation,
            }
        });
        channel.refs = channel.refs.saturating_add(1);
        debug!(%key, refs = channel.refs, "Subscribed");

        SubscriptionHandle {
            key: key.clone(),
            generation: channel.generation,
            subscription: channel.feed.subscribe(observer),
        }
    }

    /// Release a subscription; closes the feed when it was the last one.
    ///
    /// A handle whose feed was already shut down only detaches its observer.
    /// It never counts against a feed opened later for the same key.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Unsubscribed {
        let SubscriptionHandle {
            key,
            generation,
            subscription,
        } = handle;
        subscription.cancel();

        let mut channels = self.channels();
        let Some(channel) = channels
            .get_mut(&key)
            .filter(|c| c.generation == generation)
        else {
            debug!(%key, generation, "Handle outlived its feed");
            return Unsubscribed {
                remaining: 0,
                channel_closed: false,
            };
        };
        channel.refs = channel.refs.saturating_sub(1);
        let remaining = channel.refs;
        debug!(%key, refs = remaining, "Unsubscribed");

        if remaining > 0 {
            return Unsubscribed {
                remaining,
                channel_closed: false,
            };
        }
        if let Some(channel) = channels.remove(&key) {
            channel.feed.close();
            info!(%key, "Closed change feed");
        }
        Unsubscribed {
            remaining: 0,
            channel_closed: true,
        }
    }

    /// Number of open feeds.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    /// Live subscriptions on `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &ParentKey) -> usize {
        self.channels().get(key).map_or(0, |c| c.refs)
    }

    /// Status of the feed for `key`, if one is open.
    #[must_use]
    pub fn status(&self, key: &ParentKey) -> Option<FeedStatus> {
        self.channels().get(key).map(|c| c.feed.status())
    }

    /// Close every feed. Outstanding handles become inert.
    pub fn shutdown(&self) {
        let drained: Vec<(ParentKey, Channel)> = self.channels().drain().collect();
        for (key, channel) in drained {
            channel.feed.close();
            debug!(%key, refs = channel.refs, "Closed change feed on shutdown");
        }
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
