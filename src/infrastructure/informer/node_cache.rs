//! Thread-safe indexed node cache with handler fan-out.
//!
//! Both change feeds (the Kubernetes informer and the in-memory fake) feed
//! their list/watch events through a `NodeCache`, which keeps the latest
//! snapshot per key and turns each change into add/update/delete callbacks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::domain::models::Node;
use crate::domain::ports::ResourceEventHandler;

/// Latest known snapshot per node key.
#[derive(Default)]
pub struct NodeCache {
    items: RwLock<HashMap<String, Node>>,
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler>>>,
    synced: AtomicBool,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// True once the first full list has been stored and delivered.
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn list(&self) -> Vec<Node> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store an added or modified node and notify handlers.
    pub fn apply(&self, node: Node) {
        let Ok(key) = node.key() else {
            warn!("ignoring node without a name");
            return;
        };

        let old = self
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, node.clone());

        match old {
            Some(old) => self.dispatch(|handler| handler.on_update(&old, &node)),
            None => self.dispatch(|handler| handler.on_add(&node)),
        }
    }

    /// Drop a node and notify handlers if it was cached.
    pub fn delete(&self, key: &str) {
        let removed = self
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        if let Some(node) = removed {
            self.dispatch(|handler| handler.on_delete(&node));
        }
    }

    /// Replace the whole cache with a fresh list and mark it synced.
    ///
    /// Nodes already cached are delivered as updates, new ones as adds, and
    /// cached nodes missing from the list as deletes.
    pub fn replace(&self, nodes: Vec<Node>) {
        let mut fresh = HashMap::with_capacity(nodes.len());
        for node in nodes {
            match node.key() {
                Ok(key) => {
                    fresh.insert(key, node);
                }
                Err(err) => warn!(error = %err, "ignoring listed node"),
            }
        }

        let mut old = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *items, fresh.clone())
        };

        debug!(nodes = fresh.len(), "node cache replaced");

        for (key, node) in &fresh {
            match old.remove(key) {
                Some(previous) => self.dispatch(|handler| handler.on_update(&previous, node)),
                None => self.dispatch(|handler| handler.on_add(node)),
            }
        }
        for gone in old.values() {
            self.dispatch(|handler| handler.on_delete(gone));
        }

        self.synced.store(true, Ordering::Release);
    }

    /// Redeliver every cached node as an update to itself.
    pub fn resync(&self) {
        let nodes = self.list();
        debug!(nodes = nodes.len(), "resyncing node cache");
        for node in &nodes {
            self.dispatch(|handler| handler.on_update(node, node));
        }
    }

    fn dispatch(&self, notify: impl Fn(&dyn ResourceEventHandler)) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in &handlers {
            notify(handler.as_ref());
        }
    }
}
