//! Domain projection of a cluster node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::OsField;
use crate::domain::errors::KeyError;

/// A cluster node as seen by the labeler.
///
/// Only the fields the reconciliation loop reads are kept: the name (which is
/// also the cache key, nodes being cluster scoped), the two operating system
/// descriptors reported by the kubelet, and the label map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Node {
    /// Unique node name
    pub name: String,

    /// `status.nodeInfo.operatingSystem`, e.g. `linux`
    #[serde(default)]
    pub operating_system: String,

    /// `status.nodeInfo.osImage`, e.g. `Flatcar Container Linux by Kinvolk 3510.2.0`
    #[serde(default)]
    pub os_image: String,

    /// `metadata.labels`; `None` when the object has no label map at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl Node {
    /// Create a node with the given name and `operatingSystem` descriptor.
    pub fn new(name: impl Into<String>, operating_system: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operating_system: operating_system.into(),
            os_image: String::new(),
            labels: None,
        }
    }

    /// Set the `osImage` descriptor.
    #[must_use]
    pub fn with_os_image(mut self, os_image: impl Into<String>) -> Self {
        self.os_image = os_image.into();
        self
    }

    /// Add a label, creating the label map if needed.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Cache key of this node.
    ///
    /// Nodes are cluster scoped, so the key is the bare name. Objects without
    /// a name cannot be keyed.
    pub fn key(&self) -> Result<String, KeyError> {
        if self.name.is_empty() {
            return Err(KeyError::MissingName);
        }
        Ok(self.name.clone())
    }

    /// The operating system descriptor selected by `field`.
    pub fn os_descriptor(&self, field: OsField) -> &str {
        match field {
            OsField::OperatingSystem => &self.operating_system,
            OsField::OsImage => &self.os_image,
        }
    }

    /// Value of a label, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Whether the label key is present, regardless of its value.
    pub fn has_label(&self, key: &str) -> bool {
        self.label(key).is_some()
    }
}
