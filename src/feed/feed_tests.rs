use super::*;
use crate::model::{ChangeKind, EntityType};
use crate::store::{MemoryOrderStore, OrderStore};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ChangeEvent>>,
    statuses: Mutex<Vec<FeedStatus>>,
}

impl Recorder {
    fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    fn statuses(&self) -> Vec<FeedStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ChangeObserver for Recorder {
    fn on_event(&self, event: &ChangeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_status(&self, status: FeedStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

fn key() -> ParentKey {
    ParentKey::new(EntityType::AnswerOption, "question-9")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_feed_becomes_active() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let mut status = feed.status_watch();

    tokio::time::timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == FeedStatus::Active),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(feed.status(), FeedStatus::Active);
}

#[tokio::test]
async fn test_only_matching_parent_is_delivered() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let recorder = Arc::new(Recorder::default());
    let _subscription = feed.subscribe(recorder.clone());

    store
        .append(&ParentKey::new(EntityType::Question, "question-9"), json!(null))
        .await
        .unwrap();
    let mine = store.append(&key(), json!(null)).await.unwrap();

    eventually(|| recorder.events().len() == 1).await;
    let events = recorder.events();
    assert_eq!(events[0].kind, ChangeKind::Inserted);
    assert_eq!(events[0].item.id, mine.id);
}

#[tokio::test]
async fn test_cancelled_subscription_receives_nothing() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let kept = Arc::new(Recorder::default());
    let cancelled = Arc::new(Recorder::default());
    let _kept_subscription = feed.subscribe(kept.clone());
    let subscription = feed.subscribe(cancelled.clone());

    subscription.cancel();
    assert_eq!(feed.observer_count(), 1);
    store.append(&key(), json!(null)).await.unwrap();

    eventually(|| kept.events().len() == 1).await;
    assert!(cancelled.events().is_empty());
}

#[tokio::test]
async fn test_closure_observer() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let seen = Arc::new(Mutex::new(0_usize));
    let counter = Arc::clone(&seen);
    let _subscription = feed.subscribe(Arc::new(FnObserver(move |_: &ChangeEvent| {
        *counter.lock().unwrap() += 1;
    })));

    store.append(&key(), json!(null)).await.unwrap();
    store.append(&key(), json!(null)).await.unwrap();

    eventually(|| *seen.lock().unwrap() == 2).await;
}

#[tokio::test]
async fn test_lagging_feed_reports_degraded() {
    let store = MemoryOrderStore::with_capacity(2);
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let recorder = Arc::new(Recorder::default());
    let _subscription = feed.subscribe(recorder.clone());

    // The pump has not run yet on this single-threaded runtime, so these
    // overflow its buffer.
    for _ in 0..5 {
        store.append(&key(), json!(null)).await.unwrap();
    }

    eventually(|| recorder.events().len() == 2).await;
    let statuses = recorder.statuses();
    assert!(statuses.contains(&FeedStatus::Degraded), "{statuses:?}");
    assert_eq!(statuses.last(), Some(&FeedStatus::Active));
}

#[tokio::test]
async fn test_close_stops_feed() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let recorder = Arc::new(Recorder::default());
    let _subscription = feed.subscribe(recorder.clone());
    let mut status = feed.status_watch();

    feed.close();
    assert_eq!(feed.observer_count(), 0);
    tokio::time::timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == FeedStatus::Closed),
    )
    .await
    .unwrap()
    .unwrap();

    store.append(&key(), json!(null)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(recorder.events().is_empty());
    assert!(feed.is_closed());
}

#[tokio::test]
async fn test_close_tells_observers_once() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let recorder = Arc::new(Recorder::default());
    let _subscription = feed.subscribe(recorder.clone());
    eventually(|| feed.status() == FeedStatus::Active).await;

    feed.close();
    assert_eq!(recorder.statuses().last(), Some(&FeedStatus::Closed));

    drop(feed);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let closed = recorder
        .statuses()
        .iter()
        .filter(|s| **s == FeedStatus::Closed)
        .count();
    assert_eq!(closed, 1);
}

#[tokio::test]
async fn test_dropped_source_closes_feed() {
    let store = MemoryOrderStore::new();
    let feed = ChangeFeedClient::connect(key(), store.subscribe_changes());
    let recorder = Arc::new(Recorder::default());
    let _subscription = feed.subscribe(recorder.clone());

    drop(store);

    eventually(|| feed.status() == FeedStatus::Closed).await;
    assert!(recorder.statuses().contains(&FeedStatus::Closed));
}

#[test]
fn test_recv_error_mapping() {
    use tokio::sync::broadcast::error::RecvError;
    assert_eq!(
        FeedError::from(RecvError::Lagged(7)),
        FeedError::ChannelDegraded(7)
    );
    assert_eq!(FeedError::from(RecvError::Closed), FeedError::Closed);
}
