//! End-to-end controller behavior against the in-memory cluster.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::{fast_controller_config, wait_for, Harness, LABEL_KEY, LABEL_VALUE};
use flatcartag::infrastructure::memory::FakeCluster;
use flatcartag::{ControllerState, Event, Node, ObjectRepository, PatchDocument, WorkQueue};

fn cluster_with(nodes: Vec<Node>) -> Arc<FakeCluster> {
    let cluster = Arc::new(FakeCluster::new());
    for node in nodes {
        cluster.create_node(node).unwrap();
    }
    cluster
}

#[tokio::test]
async fn test_only_flatcar_node_is_labeled() {
    common::setup_test_logging();
    let cluster = cluster_with(vec![
        Node::new("node-ubuntu", "ubuntu").with_label("zone", "a"),
        Node::new("node-centos", "centos").with_label("zone", "a"),
        Node::new("node-flatcar", "flatcar").with_label("zone", "a"),
    ]);
    let harness = Harness::start(cluster.clone()).await;

    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);
    assert!(wait_for(|| harness.controller.stats().no_action == 2, 2000).await);

    let labeled = cluster.nodes_with_label(LABEL_KEY, LABEL_VALUE);
    assert_eq!(labeled[0].name, "node-flatcar");
    assert!(!cluster.get_node("node-ubuntu").unwrap().has_label(LABEL_KEY));
    assert!(!cluster.get_node("node-centos").unwrap().has_label(LABEL_KEY));
    assert_eq!(cluster.patch_calls(), 1);

    let controller = harness.stop().await;
    assert_eq!(controller.state(), ControllerState::Stopped);
}

#[tokio::test]
async fn test_node_without_labels_is_labeled() {
    let cluster = cluster_with(vec![Node::new("bare", "flatcar")]);
    let harness = Harness::start(cluster.clone()).await;

    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);
    assert_eq!(
        cluster.get_node("bare").unwrap().label(LABEL_KEY),
        Some(LABEL_VALUE)
    );
    harness.stop().await;
}

#[tokio::test]
async fn test_label_drift_is_repaired() {
    let cluster = cluster_with(vec![
        Node::new("node-ubuntu", "ubuntu").with_label("zone", "a"),
        Node::new("node-flatcar", "flatcar").with_label("zone", "a"),
    ]);
    let harness = Harness::start(cluster.clone()).await;
    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);

    cluster
        .apply_patch("node-flatcar", &PatchDocument::remove_label(LABEL_KEY))
        .unwrap();

    assert!(wait_for(|| cluster.patch_calls_for("node-flatcar") == 2, 2000).await);
    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);
    assert_eq!(
        cluster.get_node("node-flatcar").unwrap().label(LABEL_KEY),
        Some(LABEL_VALUE)
    );
    harness.stop().await;
}

#[tokio::test]
async fn test_missing_key_is_retried_then_dropped() {
    let cluster = cluster_with(vec![Node::new("node-ubuntu", "ubuntu")]);
    let harness = Harness::start(cluster.clone()).await;

    harness.controller.queue().add(Event::created("deleted-node"));

    assert!(wait_for(|| harness.reporter.errors().len() == 1, 2000).await);
    let errors = harness.reporter.errors();
    assert!(errors[0].contains("deleted-node"));
    assert!(errors[0].contains("not found"));

    // Give any stray sixth attempt a chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = harness.controller.stats();
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.requeued, 4);
    assert_eq!(stats.dropped, 1);
    assert_eq!(harness.reporter.errors().len(), 1);
    assert_eq!(harness.controller.state(), ControllerState::Running);

    harness.stop().await;
}

#[tokio::test]
async fn test_prelabeled_node_is_never_patched() {
    let cluster = cluster_with(vec![
        Node::new("node-flatcar", "flatcar").with_label(LABEL_KEY, LABEL_VALUE)
    ]);
    let harness = Harness::start(cluster.clone()).await;
    assert!(wait_for(|| harness.controller.stats().no_action == 1, 2000).await);

    // Unrelated change: the update path sees the label and enqueues nothing
    cluster
        .apply_patch(
            "node-flatcar",
            &PatchDocument::add_label("zone", "b", true),
        )
        .unwrap();
    assert!(wait_for(
        || cluster.get_node("node-flatcar").unwrap().label("zone") == Some("b"),
        2000
    )
    .await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cluster.patch_calls(), 0);
    assert_eq!(harness.controller.stats().no_action, 1);
    assert!(harness.controller.queue().is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_failing_node_is_attempted_exactly_five_times() {
    let cluster = cluster_with(vec![
        Node::new("broken", "flatcar").with_label("zone", "a"),
        Node::new("healthy", "flatcar").with_label("zone", "a"),
    ]);
    cluster.fail_patches_for("broken");
    let harness = Harness::start(cluster.clone()).await;

    assert!(wait_for(|| harness.reporter.errors().len() == 1, 2000).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cluster.patch_calls_for("broken"), 5);
    assert_eq!(harness.reporter.errors().len(), 1);
    assert!(harness.reporter.errors()[0].contains("broken"));

    // The failing key never held up the healthy one
    assert_eq!(cluster.patch_calls_for("healthy"), 1);
    assert!(cluster.get_node("healthy").unwrap().has_label(LABEL_KEY));
    harness.stop().await;
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let cluster = cluster_with(vec![
        Node::new("a", "flatcar").with_label("zone", "a"),
        Node::new("b", "ubuntu").with_label("zone", "a"),
    ]);
    let harness = Harness::start(cluster.clone()).await;
    assert!(wait_for(|| harness.controller.stats().labeled == 1, 2000).await);
    assert!(wait_for(|| harness.controller.stats().no_action == 1, 2000).await);
    let before = cluster.list();

    for name in ["a", "b"] {
        harness.controller.queue().add(Event::updated(name));
    }
    assert!(wait_for(|| harness.controller.stats().no_action == 3, 2000).await);

    assert_eq!(cluster.patch_calls(), 1);
    assert_eq!(cluster.list(), before);
    harness.stop().await;
}

/// Delegates to the cluster after a delay and tracks concurrent calls per node.
struct SlowRepository {
    cluster: Arc<FakeCluster>,
    delay: Duration,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl ObjectRepository for SlowRepository {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.cluster.list_nodes().await
    }

    async fn patch_node(&self, name: &str, patch: &PatchDocument) -> Result<Node> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(name.to_string()).or_insert(0);
            *count += 1;
            self.max_in_flight.fetch_max(*count, Ordering::SeqCst);
        }
        tokio::time::sleep(self.delay).await;
        let result = self.cluster.patch_node(name, patch).await;
        *self.in_flight.lock().unwrap().get_mut(name).unwrap() -= 1;
        result
    }
}

#[tokio::test]
async fn test_duplicate_notifications_never_overlap() {
    let cluster = cluster_with(vec![Node::new("node-flatcar", "flatcar").with_label("zone", "a")]);
    let repository = Arc::new(SlowRepository {
        cluster: cluster.clone(),
        delay: Duration::from_millis(50),
        in_flight: Mutex::new(HashMap::new()),
        max_in_flight: AtomicUsize::new(0),
    });
    let config = flatcartag::ControllerConfig {
        workers: 4,
        ..fast_controller_config()
    };
    let harness = Harness::start_with(cluster.clone(), repository.clone(), config).await;

    // Queue duplicates while the first patch is still in flight
    assert!(wait_for(|| repository.max_in_flight.load(Ordering::SeqCst) == 1, 2000).await);
    for _ in 0..3 {
        harness.controller.queue().add(Event::updated("node-flatcar"));
    }

    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);
    assert!(wait_for(|| harness.controller.queue().is_empty(), 2000).await);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(repository.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(cluster.patch_calls() <= 2);
    harness.stop().await;
}

#[tokio::test]
async fn test_new_nodes_after_start_are_labeled() {
    let cluster = cluster_with(Vec::new());
    let harness = Harness::start(cluster.clone()).await;

    cluster
        .create_node(Node::new("late-flatcar", "flatcar").with_label("zone", "a"))
        .unwrap();
    cluster
        .create_node(Node::new("late-ubuntu", "ubuntu").with_label("zone", "a"))
        .unwrap();

    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);
    assert!(cluster.get_node("late-flatcar").unwrap().has_label(LABEL_KEY));
    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_drains_and_stops() {
    let cluster = cluster_with(vec![Node::new("a", "flatcar").with_label("zone", "a")]);
    let harness = Harness::start(cluster.clone()).await;
    assert!(wait_for(|| harness.labeled_count() == 1, 2000).await);

    let controller = harness.stop().await;
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert!(controller.queue().is_shutting_down());

    // Adds after shutdown are ignored
    controller.queue().add(Event::created("a"));
    assert!(controller.queue().is_empty());
}
