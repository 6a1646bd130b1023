use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node as K8sNode;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::Value;
use tracing::debug;

use crate::domain::models::{Node, PatchDocument};
use crate::domain::ports::ObjectRepository;

/// `ObjectRepository` backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeNodeRepository {
    api: Api<K8sNode>,
}

impl KubeNodeRepository {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ObjectRepository for KubeNodeRepository {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self
            .api
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        Ok(nodes.items.iter().map(Node::from).collect())
    }

    async fn patch_node(&self, name: &str, patch: &PatchDocument) -> Result<Node> {
        let request: Patch<Value> = match patch {
            PatchDocument::Json(_) => Patch::Json(
                serde_json::from_value(patch.to_value()?).context("Failed to encode JSON patch")?,
            ),
            PatchDocument::Merge(document) => Patch::Merge(document.clone()),
        };

        debug!(
            node = %name,
            operations = patch.len(),
            merge = patch.is_merge(),
            "patching node"
        );

        let node = self
            .api
            .patch(name, &PatchParams::default(), &request)
            .await
            .with_context(|| format!("Failed to patch node {name}"))?;
        Ok(Node::from(&node))
    }
}
