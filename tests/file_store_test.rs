#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{create_test_dir, questions, seed, stored_names, stored_orders, wait_for_names};
use ordersync::config::ReorderSettings;
use ordersync::{
    CollectionSession, EntityType, FileOrderStore, OrderStore, ParentKey, ReorderCoordinator,
    StoreError, SubscriptionRegistry,
};
use std::sync::Arc;

#[tokio::test]
async fn test_reorder_persists_to_disk() {
    let temp_dir = create_test_dir();
    let store = Arc::new(FileOrderStore::new(temp_dir.path()));
    let ids = seed(store.as_ref(), &questions(), &["A", "B", "C", "D"]).await;

    ReorderCoordinator::new(store.clone(), ReorderSettings::default())
        .move_item(&questions(), &ids[3], 0)
        .await
        .expect("Should move D to the front");

    let reopened = FileOrderStore::new(temp_dir.path());
    assert_eq!(
        stored_names(&reopened, &questions()).await,
        vec!["D", "A", "B", "C"]
    );
    assert_eq!(stored_orders(&reopened, &questions()).await, vec![0, 1, 2, 3]);
    assert!(temp_dir
        .path()
        .join("question")
        .join("module-1.json")
        .exists());
}

#[tokio::test]
async fn test_collections_are_separate_documents() {
    let temp_dir = create_test_dir();
    let store = FileOrderStore::new(temp_dir.path());
    let options = ParentKey::new(EntityType::AnswerOption, "question-7");
    seed(&store, &questions(), &["Q1"]).await;
    seed(&store, &options, &["yes", "no"]).await;

    assert_eq!(stored_names(&store, &options).await, vec!["yes", "no"]);
    assert_eq!(stored_names(&store, &questions()).await, vec!["Q1"]);
    assert!(temp_dir
        .path()
        .join("answer-option")
        .join("question-7.json")
        .exists());
}

#[tokio::test]
async fn test_remove_then_append_keeps_orders_unique() {
    let temp_dir = create_test_dir();
    let store = FileOrderStore::new(temp_dir.path());
    let ids = seed(&store, &questions(), &["A", "B", "C"]).await;

    store.remove(&ids[0]).await.unwrap();
    seed(&store, &questions(), &["D"]).await;

    assert_eq!(stored_orders(&store, &questions()).await, vec![1, 2, 3]);
    assert!(matches!(
        store.get(&ids[0]).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_session_over_file_store_sees_remote_moves() {
    let temp_dir = create_test_dir();
    let store: Arc<dyn OrderStore> = Arc::new(FileOrderStore::new(temp_dir.path()));
    let ids = seed(store.as_ref(), &questions(), &["A", "B", "C"]).await;
    let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&store)));
    let coordinator = Arc::new(ReorderCoordinator::new(
        Arc::clone(&store),
        ReorderSettings::default(),
    ));

    let watcher = CollectionSession::open(registry.clone(), coordinator.clone(), questions())
        .await
        .unwrap();
    coordinator.move_item(&questions(), &ids[0], 2).await.unwrap();

    wait_for_names(watcher.view(), &["B", "C", "A"]).await;
    assert!(watcher.close().channel_closed);
}
