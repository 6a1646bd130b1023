use crate::domain::models::{Node, PatchDocument};
use anyhow::Result;
use async_trait::async_trait;

/// Port for the authoritative node store following hexagonal architecture
///
/// Implementations talk to the Kubernetes API server or keep nodes in memory
/// for tests. The labeler never creates or deletes nodes; the only mutation
/// it issues is a JSON patch.
///
/// # Examples
///
/// ```no_run
/// use flatcartag::domain::models::PatchDocument;
/// use flatcartag::domain::ports::ObjectRepository;
/// use anyhow::Result;
///
/// async fn label(repository: &dyn ObjectRepository, name: &str) -> Result<()> {
///     let patch = PatchDocument::add_label("k8c.io/uses-container-linux", "true", true);
///     repository.patch_node(name, &patch).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// List every node in the cluster
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Node>)` - All nodes currently known to the store
    /// * `Err` - If the store cannot be reached
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Apply a JSON patch to the named node
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the node to patch
    /// * `patch` - Operations to apply atomically
    ///
    /// # Returns
    ///
    /// * `Ok(Node)` - The node as stored after the patch
    /// * `Err` - Conflict, invalid patch, network or authorization failure
    async fn patch_node(&self, name: &str, patch: &PatchDocument) -> Result<Node>;
}
