//! Reconciles a single queued event against the cached node state.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::domain::errors::ReconcileError;
use crate::domain::models::{Event, PatchDocument, ReconcileOutcome, TargetConfig};
use crate::domain::ports::{ChangeFeed, ObjectRepository};

/// Applies the target label to nodes whose OS descriptor matches.
pub struct Reconciler {
    feed: Arc<dyn ChangeFeed>,
    repository: Arc<dyn ObjectRepository>,
    target: TargetConfig,
}

impl Reconciler {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        repository: Arc<dyn ObjectRepository>,
        target: TargetConfig,
    ) -> Self {
        Self {
            feed,
            repository,
            target,
        }
    }

    /// Reconcile the node behind `event`.
    ///
    /// Always reads the current cached snapshot, so a retry sees whatever
    /// changed since the event was queued. At most one patch call is made.
    #[instrument(skip_all, fields(key = %event.key, kind = %event.kind))]
    pub async fn process_item(&self, event: &Event) -> Result<ReconcileOutcome, ReconcileError> {
        let node = self
            .feed
            .get_by_key(&event.key)
            .map_err(|source| ReconcileError::Lookup {
                key: event.key.clone(),
                source,
            })?
            .ok_or_else(|| ReconcileError::NotFound {
                key: event.key.clone(),
            })?;

        let target = &self.target;
        if !target.matches(&node) {
            debug!(
                os = node.os_descriptor(target.os_field),
                "operating system does not match, ignoring"
            );
            return Ok(ReconcileOutcome::NoActionNeeded);
        }

        if node.label(&target.label_key) == Some(target.label_value.as_str()) {
            debug!("node already labeled");
            return Ok(ReconcileOutcome::NoActionNeeded);
        }

        info!(
            node = %node.name,
            label = %target.label_key,
            value = %target.label_value,
            "node runs Flatcar Container Linux, applying label"
        );

        let patch =
            PatchDocument::add_label(&target.label_key, &target.label_value, node.labels.is_some());
        self.repository
            .patch_node(&node.name, &patch)
            .await
            .map_err(|source| ReconcileError::Patch {
                name: node.name.clone(),
                source,
            })?;

        Ok(ReconcileOutcome::Labeled)
    }
}
