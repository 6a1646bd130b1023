//! `ChangeFeed` over the Kubernetes node watch.
//!
//! Runs `kube::runtime::watcher` against all nodes and folds its events into a
//! [`NodeCache`]. A (re)list arrives as `Init`, a run of `InitApply`, then
//! `InitDone`; the listed nodes are buffered and swapped into the cache in one
//! step, which is also what marks the feed synced.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node as K8sNode;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::models::Node;
use crate::domain::ports::{ChangeFeed, ResourceEventHandler};
use crate::infrastructure::informer::{next_resync, resync_interval, NodeCache};

/// Node informer backed by a list+watch on the API server.
pub struct KubeNodeInformer {
    client: Client,
    cache: Arc<NodeCache>,
    resync_period: Option<Duration>,
}

impl KubeNodeInformer {
    pub fn new(client: Client, resync_period: Option<Duration>) -> Self {
        Self {
            client,
            cache: Arc::new(NodeCache::new()),
            resync_period,
        }
    }

    fn handle(&self, event: watcher::Event<K8sNode>, relist: &mut Option<Vec<Node>>) {
        match event {
            watcher::Event::Init => {
                debug!("node list started");
                *relist = Some(Vec::new());
            }
            watcher::Event::InitApply(node) => {
                relist.get_or_insert_with(Vec::new).push(Node::from(&node));
            }
            watcher::Event::InitDone => {
                let nodes = relist.take().unwrap_or_default();
                info!(nodes = nodes.len(), "node list complete");
                self.cache.replace(nodes);
            }
            watcher::Event::Apply(node) => self.cache.apply(Node::from(&node)),
            watcher::Event::Delete(node) => {
                if let Some(name) = node.metadata.name.as_deref() {
                    self.cache.delete(name);
                }
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for KubeNodeInformer {
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
        let api: Api<K8sNode> = Api::all(self.client.clone());
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        futures::pin_mut!(stream);

        let mut resync = resync_interval(self.resync_period);
        let mut relist = None;

        info!("starting node informer");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = next_resync(&mut resync) => self.cache.resync(),
                event = stream.next() => match event {
                    Some(Ok(event)) => self.handle(event, &mut relist),
                    Some(Err(err)) => warn!(error = %err, "node watch failed, retrying"),
                    None => {
                        warn!("node watch stream ended");
                        break;
                    }
                },
            }
        }

        info!("node informer stopped");
        Ok(())
    }
}
