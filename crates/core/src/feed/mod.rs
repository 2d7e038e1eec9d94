//! Live subscriptions over the order store.
//!
//! Every subscription delivers a complete snapshot first and again after
//! each committed write that can affect it. Snapshots supersede each other,
//! so a consumer only ever needs the latest one.

mod subscription;

pub use subscription::Subscription;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::metrics::{FEED_RESYNCS, FEED_SNAPSHOTS};
use crate::order::{Order, OrderChange, OrderError, OrderStore};

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchQuery {
    /// One order by id.
    Order(String),
    /// All orders addressed to a shop.
    Shop(String),
    /// All orders placed by a customer.
    Owner(String),
}

impl WatchQuery {
    /// Whether `change` can alter this query's result.
    pub fn matches(&self, change: &OrderChange) -> bool {
        match self {
            WatchQuery::Order(id) => &change.order_id == id,
            WatchQuery::Shop(shop_id) => &change.shop_id == shop_id,
            WatchQuery::Owner(owner_id) => &change.owner_id == owner_id,
        }
    }

    /// Read the current result.
    pub fn read(&self, store: &dyn OrderStore) -> Result<Snapshot, OrderError> {
        match self {
            WatchQuery::Order(id) => store.get(id).map(Snapshot::Order),
            WatchQuery::Shop(shop_id) => store.list_for_shop(shop_id).map(Snapshot::Orders),
            WatchQuery::Owner(owner_id) => store.list_for_owner(owner_id).map(Snapshot::Orders),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WatchQuery::Order(_) => "order",
            WatchQuery::Shop(_) => "shop",
            WatchQuery::Owner(_) => "owner",
        }
    }
}

impl fmt::Display for WatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchQuery::Order(id) => write!(f, "order:{}", id),
            WatchQuery::Shop(id) => write!(f, "shop:{}", id),
            WatchQuery::Owner(id) => write!(f, "owner:{}", id),
        }
    }
}

/// Full current result of a [`WatchQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    /// `None` once the order no longer exists.
    Order(Option<Order>),
    Orders(Vec<Order>),
}

/// Issues live subscriptions backed by the store's change notifications.
#[derive(Clone)]
pub struct ChangeFeed {
    store: Arc<dyn OrderStore>,
    config: FeedConfig,
}

impl ChangeFeed {
    pub fn new(store: Arc<dyn OrderStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    /// Watch a single order. Yields `None` after it has been removed.
    pub fn watch_order(&self, order_id: impl Into<String>) -> Subscription<Option<Order>> {
        let order_id = order_id.into();
        let query = WatchQuery::Order(order_id.clone());
        self.spawn(query, move |store| store.get(&order_id))
    }

    /// Watch every order addressed to a shop, newest first.
    pub fn watch_shop(&self, shop_id: impl Into<String>) -> Subscription<Vec<Order>> {
        let shop_id = shop_id.into();
        let query = WatchQuery::Shop(shop_id.clone());
        self.spawn(query, move |store| store.list_for_shop(&shop_id))
    }

    /// Watch every order placed by a customer, newest first.
    pub fn watch_owner(&self, owner_id: impl Into<String>) -> Subscription<Vec<Order>> {
        let owner_id = owner_id.into();
        let query = WatchQuery::Owner(owner_id.clone());
        self.spawn(query, move |store| store.list_for_owner(&owner_id))
    }

    /// Watch any query, yielding untyped snapshots.
    pub fn watch(&self, query: WatchQuery) -> Subscription<Snapshot> {
        let reader = query.clone();
        self.spawn(query, move |store| reader.read(store))
    }

    fn spawn<T, F>(&self, query: WatchQuery, read: F) -> Subscription<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&dyn OrderStore) -> Result<T, OrderError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        // Subscribe before the first read so no commit falls in between.
        let mut changes = store.subscribe();
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        let label = query.label();

        let task = tokio::spawn(async move {
            debug!(query = %query, "Subscription started");

            let mut last: Option<T> = None;
            let mut refresh = true;

            loop {
                if refresh {
                    match read(store.as_ref()) {
                        Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                            if tx.send(snapshot.clone()).await.is_err() {
                                break;
                            }
                            FEED_SNAPSHOTS.with_label_values(&[label]).inc();
                            last = Some(snapshot);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(query = %query, error = %e, "Failed to read snapshot");
                        }
                    }
                }

                refresh = tokio::select! {
                    _ = tx.closed() => break,
                    received = changes.recv() => match received {
                        Ok(change) => query.matches(&change),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(query = %query, skipped, "Subscription lagged, resynchronizing");
                            FEED_RESYNCS.inc();
                            true
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
            }

            debug!(query = %query, "Subscription ended");
        });

        Subscription::new(rx, task)
    }
}
