//! JSON-patch documents for label mutations.
//!
//! Serialises to the RFC 6902 array shape accepted by the API server for
//! `application/json-patch+json` requests:
//!
//! ```json
//! [{"op":"add","path":"/metadata/labels/k8c.io~1uses-container-linux","value":"true"}]
//! ```
//!
//! Nodes without a label map get an `application/merge-patch+json` document
//! naming only the one label.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-pointer path of the label map.
pub const LABELS_PATH: &str = "/metadata/labels";

/// Escape one JSON-pointer reference token (`~` becomes `~0`, `/` becomes `~1`).
pub fn escape_json_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_json_pointer`].
pub fn unescape_json_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// JSON-pointer path of one label.
pub fn label_path(key: &str) -> String {
    format!("{LABELS_PATH}/{}", escape_json_pointer(key))
}

/// A single patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Add (or replace) the value at `path`; the parent must exist
    Add { path: String, value: Value },
    /// Remove the value at `path`; the value must exist
    Remove { path: String },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } => path,
        }
    }
}

/// A node patch as sent to the API server.
///
/// `Json` is an RFC 6902 operation list, applied atomically by the server.
/// `Merge` is an RFC 7386 merge document; it only touches the keys it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchDocument {
    Json(Vec<PatchOperation>),
    Merge(Value),
}

impl Default for PatchDocument {
    fn default() -> Self {
        Self::Json(Vec::new())
    }
}

impl PatchDocument {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self::Json(operations)
    }

    /// Patch that sets a single label and nothing else.
    ///
    /// A JSON-patch `add` into a missing label map fails, and adding the map
    /// itself would replace any labels written since the snapshot was taken.
    /// When the snapshot shows no label map, a merge patch naming only this
    /// key is used instead.
    pub fn add_label(key: &str, value: &str, label_map_present: bool) -> Self {
        if label_map_present {
            Self::Json(vec![PatchOperation::Add {
                path: label_path(key),
                value: Value::String(value.to_string()),
            }])
        } else {
            Self::Merge(json!({ "metadata": { "labels": { key: value } } }))
        }
    }

    /// Patch that removes a single label.
    pub fn remove_label(key: &str) -> Self {
        Self::Json(vec![PatchOperation::Remove {
            path: label_path(key),
        }])
    }

    /// JSON-patch operations; empty for a merge patch.
    pub fn operations(&self) -> &[PatchOperation] {
        match self {
            Self::Json(operations) => operations,
            Self::Merge(_) => &[],
        }
    }

    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Json(operations) => operations.len(),
            Self::Merge(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(operations) => operations.is_empty(),
            Self::Merge(document) => document.as_object().is_some_and(serde_json::Map::is_empty),
        }
    }

    /// Render as the JSON value sent on the wire.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
