use crate::domain::models::Node;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Callbacks fired by a [`ChangeFeed`] as the cache changes.
///
/// Handlers run on the feed's delivery task and must not block.
pub trait ResourceEventHandler: Send + Sync {
    /// A node entered the cache (initial list or watch add)
    fn on_add(&self, node: &Node);

    /// A cached node was replaced by a newer snapshot, or redelivered on resync
    fn on_update(&self, old: &Node, new: &Node);

    /// A node left the cache
    fn on_delete(&self, _node: &Node) {}
}

/// Port for a list+watch change feed backed by a local read cache
///
/// The feed is typed to [`Node`]: whatever it hands out is a node, so
/// consumers never have to check object kinds at runtime.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Register a handler; it receives every notification from then on
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>);

    /// Whether the initial list has been fully loaded into the cache
    fn has_synced(&self) -> bool;

    /// Latest cached snapshot for `key`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Node))` - The cached node
    /// * `Ok(None)` - No such key in the cache
    /// * `Err` - If the cache cannot be read
    fn get_by_key(&self, key: &str) -> Result<Option<Node>>;

    /// Pump the feed until `shutdown` fires
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}
