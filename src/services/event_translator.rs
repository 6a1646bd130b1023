//! Turns change-feed notifications into queued [`Event`]s.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{Event, EventKind, Node};
use crate::domain::ports::{ResourceEventHandler, WorkQueue};

/// Feed handler that enqueues one event per interesting notification.
///
/// Deletions are ignored. De-duplication is left to the queue.
pub struct EventTranslator {
    queue: Arc<dyn WorkQueue<Event>>,
    label_key: String,
}

impl EventTranslator {
    pub fn new(queue: Arc<dyn WorkQueue<Event>>, label_key: impl Into<String>) -> Self {
        Self {
            queue,
            label_key: label_key.into(),
        }
    }

    fn enqueue(&self, node: &Node, kind: EventKind) {
        match node.key() {
            Ok(key) => {
                debug!(key = %key, kind = %kind, "enqueueing node");
                self.queue.add(Event::new(key, kind));
            }
            Err(err) => warn!(error = %err, kind = %kind, "dropping notification"),
        }
    }
}

impl ResourceEventHandler for EventTranslator {
    fn on_add(&self, node: &Node) {
        self.enqueue(node, EventKind::Created);
    }

    fn on_update(&self, _old: &Node, new: &Node) {
        // Only nodes still missing the label are worth another look.
        if new.has_label(&self.label_key) {
            return;
        }
        self.enqueue(new, EventKind::Updated);
    }
}
