// Allow panic/unwrap/expect in tests (denied globally via Cargo.toml lints)
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing
    )
)]

pub mod config;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod reorder;
pub mod session;
pub mod store;
pub mod subscription;
pub mod utils;
pub mod view;

// Re-export commonly used types
pub use config::{load_config, OrderSyncConfig, ReorderSettings};
pub use feed::{ChangeFeedClient, ChangeObserver, FeedError, FeedStatus, FeedSubscription, FnObserver};
pub use model::{ChangeEvent, ChangeKind, EntityType, ItemId, OrderedItem, ParentKey};
pub use reorder::{ReorderCoordinator, ReorderError, ReorderOutcome};
pub use session::{CollectionSession, SessionError};
pub use store::{FileOrderStore, MemoryOrderStore, OrderStore, StoreError};
pub use subscription::{SubscriptionHandle, SubscriptionRegistry, Unsubscribed};
pub use view::{LocalCollectionView, ViewError};
