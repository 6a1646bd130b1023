//! In-memory cluster used to exercise the controller without an API server.
//!
//! [`FakeCluster`] is the authoritative store: it applies JSON patches with the
//! same parent-must-exist rule as the API server and merge patches on labels, counts the patch calls made
//! through the [`ObjectRepository`] port, and broadcasts every change.
//! [`FakeNodeFeed`] lists and watches it through a [`NodeCache`], like the real
//! informer does against the API server.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::models::patch::{unescape_json_pointer, LABELS_PATH};
use crate::domain::models::{Node, PatchDocument, PatchOperation};
use crate::domain::ports::{ChangeFeed, ObjectRepository, ResourceEventHandler};
use crate::infrastructure::informer::{next_resync, resync_interval, NodeCache};

const EVENT_CAPACITY: usize = 1024;

/// A change in the fake cluster, as seen by watchers.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    Applied(Node),
    Deleted(Node),
}

/// In-memory authoritative node store.
pub struct FakeCluster {
    nodes: Mutex<BTreeMap<String, Node>>,
    events: broadcast::Sender<ClusterEvent>,
    patch_calls: AtomicUsize,
    patch_calls_by_node: Mutex<HashMap<String, usize>>,
    failing_nodes: Mutex<HashSet<String>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeCluster {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            nodes: Mutex::new(BTreeMap::new()),
            events,
            patch_calls: AtomicUsize::new(0),
            patch_calls_by_node: Mutex::new(HashMap::new()),
            failing_nodes: Mutex::new(HashSet::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.events.subscribe()
    }

    pub fn create_node(&self, node: Node) -> Result<Node> {
        let key = node.key()?;
        let mut nodes = lock(&self.nodes);
        if nodes.contains_key(&key) {
            bail!("node {key} already exists");
        }
        nodes.insert(key, node.clone());
        drop(nodes);

        self.broadcast(ClusterEvent::Applied(node.clone()));
        Ok(node)
    }

    pub fn delete_node(&self, name: &str) -> Result<Node> {
        let node = lock(&self.nodes)
            .remove(name)
            .ok_or_else(|| anyhow!("node {name} not found"))?;
        self.broadcast(ClusterEvent::Deleted(node.clone()));
        Ok(node)
    }

    pub fn get_node(&self, name: &str) -> Option<Node> {
        lock(&self.nodes).get(name).cloned()
    }

    pub fn list(&self) -> Vec<Node> {
        lock(&self.nodes).values().cloned().collect()
    }

    /// Nodes currently carrying `key=value`.
    pub fn nodes_with_label(&self, key: &str, value: &str) -> Vec<Node> {
        lock(&self.nodes)
            .values()
            .filter(|node| node.label(key) == Some(value))
            .cloned()
            .collect()
    }

    /// Apply a patch as an outside writer would; not counted as a patch call.
    pub fn apply_patch(&self, name: &str, patch: &PatchDocument) -> Result<Node> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .get_mut(name)
            .ok_or_else(|| anyhow!("node {name} not found"))?;
        apply_operations(node, patch).with_context(|| format!("invalid patch for node {name}"))?;
        let updated = node.clone();
        drop(nodes);

        self.broadcast(ClusterEvent::Applied(updated.clone()));
        Ok(updated)
    }

    /// Make every `patch_node` call for `name` fail.
    pub fn fail_patches_for(&self, name: &str) {
        lock(&self.failing_nodes).insert(name.to_string());
    }

    /// Total `patch_node` calls, failed ones included.
    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls_for(&self, name: &str) -> usize {
        lock(&self.patch_calls_by_node).get(name).copied().unwrap_or(0)
    }

    fn broadcast(&self, event: ClusterEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(event);
    }
}

fn label_key(path: &str) -> Result<String> {
    path.strip_prefix(LABELS_PATH)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|token| !token.is_empty() && !token.contains('/'))
        .map(unescape_json_pointer)
        .ok_or_else(|| anyhow!("unsupported patch path {path}"))
}

/// Apply the whole patch or none of it.
fn apply_operations(node: &mut Node, patch: &PatchDocument) -> Result<()> {
    let mut staged = node.clone();

    if let PatchDocument::Merge(document) = patch {
        merge_labels(&mut staged, document)?;
    }
    for operation in patch.operations() {
        match operation {
            PatchOperation::Add { path, value } if path == LABELS_PATH => {
                let labels: BTreeMap<String, String> = serde_json::from_value(value.clone())
                    .context("label map must be an object of strings")?;
                staged.labels = Some(labels);
            }
            PatchOperation::Add { path, value } => {
                let key = label_key(path)?;
                let value = value
                    .as_str()
                    .ok_or_else(|| anyhow!("label value at {path} must be a string"))?;
                staged
                    .labels
                    .as_mut()
                    .ok_or_else(|| anyhow!("add to {path}: {LABELS_PATH} does not exist"))?
                    .insert(key, value.to_string());
            }
            PatchOperation::Remove { path } if path == LABELS_PATH => {
                staged
                    .labels
                    .take()
                    .ok_or_else(|| anyhow!("remove {path}: path does not exist"))?;
            }
            PatchOperation::Remove { path } => {
                let key = label_key(path)?;
                staged
                    .labels
                    .as_mut()
                    .and_then(|labels| labels.remove(&key))
                    .ok_or_else(|| anyhow!("remove {path}: path does not exist"))?;
            }
        }
    }

    *node = staged;
    Ok(())
}

/// Merge-patch semantics for `metadata.labels`: named keys are set, `null`
/// removes a key, everything else is left alone.
fn merge_labels(node: &mut Node, document: &Value) -> Result<()> {
    let metadata = document
        .as_object()
        .filter(|root| root.keys().all(|field| field == "metadata"))
        .and_then(|root| root.get("metadata"))
        .and_then(Value::as_object)
        .filter(|metadata| metadata.keys().all(|field| field == "labels"))
        .ok_or_else(|| anyhow!("merge patch may only touch metadata.labels"))?;

    match metadata.get("labels") {
        None => {}
        Some(Value::Null) => node.labels = None,
        Some(Value::Object(changes)) => {
            let labels = node.labels.get_or_insert_with(BTreeMap::new);
            for (key, value) in changes {
                match value {
                    Value::Null => {
                        labels.remove(key);
                    }
                    Value::String(value) => {
                        labels.insert(key.clone(), value.clone());
                    }
                    other => bail!("label {key} must be a string or null, got {other}"),
                }
            }
        }
        Some(other) => bail!("metadata.labels must be an object, got {other}"),
    }
    Ok(())
}

#[async_trait]
impl ObjectRepository for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.list())
    }

    async fn patch_node(&self, name: &str, patch: &PatchDocument) -> Result<Node> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.patch_calls_by_node)
            .entry(name.to_string())
            .or_insert(0) += 1;

        if lock(&self.failing_nodes).contains(name) {
            bail!("injected patch failure for node {name}");
        }

        self.apply_patch(name, patch)
    }
}

/// `ChangeFeed` that lists and watches a [`FakeCluster`].
pub struct FakeNodeFeed {
    cluster: Arc<FakeCluster>,
    cache: Arc<NodeCache>,
    resync_period: Option<Duration>,
}

impl FakeNodeFeed {
    pub fn new(cluster: Arc<FakeCluster>) -> Self {
        Self {
            cluster,
            cache: Arc::new(NodeCache::new()),
            resync_period: None,
        }
    }

    #[must_use]
    pub fn with_resync_period(mut self, period: Duration) -> Self {
        self.resync_period = Some(period);
        self
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }
}

#[async_trait]
impl ChangeFeed for FakeNodeFeed {
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        self.cache.add_handler(handler);
    }

    fn has_synced(&self) -> bool {
        self.cache.has_synced()
    }

    fn get_by_key(&self, key: &str) -> Result<Option<Node>> {
        Ok(self.cache.get(key))
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        // Subscribe before listing so nothing between the two is missed.
        let mut events = self.cluster.subscribe();
        self.cache.replace(self.cluster.list());

        let mut resync = resync_interval(self.resync_period);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = next_resync(&mut resync) => self.cache.resync(),
                event = events.recv() => match event {
                    Ok(ClusterEvent::Applied(node)) => self.cache.apply(node),
                    Ok(ClusterEvent::Deleted(node)) => self.cache.delete(&node.name),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "fake watch lagged, relisting");
                        self.cache.replace(self.cluster.list());
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        debug!("fake node feed stopped");
        Ok(())
    }
}
