use k8s_openapi::api::core::v1::Node as K8sNode;

use crate::domain::models::Node;

impl From<&K8sNode> for Node {
    fn from(node: &K8sNode) -> Self {
        let info = node.status.as_ref().and_then(|status| status.node_info.as_ref());

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            operating_system: info
                .map(|info| info.operating_system.clone())
                .unwrap_or_default(),
            os_image: info.map(|info| info.os_image.clone()).unwrap_or_default(),
            labels: node.metadata.labels.clone(),
        }
    }
}
