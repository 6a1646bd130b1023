mod common;

use std::sync::Arc;

use common::{wait_for, Harness, LABEL_KEY, LABEL_VALUE};
use flatcartag::infrastructure::memory::FakeCluster;
use flatcartag::{Node, PatchDocument};
use proptest::prelude::*;

const OS_DESCRIPTORS: &[&str] = &[
    "ubuntu",
    "centos",
    "flatcar",
    "Flatcar",
    "linux-flatcar-lts",
    "rhel",
    "",
];

fn node_strategy() -> impl Strategy<Value = (usize, bool, bool)> {
    // (descriptor index, has a label map, pre-labeled)
    (0..OS_DESCRIPTORS.len(), any::<bool>(), any::<bool>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: after convergence the label is present iff the OS matches
    ///
    /// Only matching nodes are generated pre-labeled; the controller never
    /// removes labels, so a pre-labeled non-matching node would stay labeled.
    #[test]
    fn prop_label_present_iff_os_matches(specs in prop::collection::vec(node_strategy(), 1..8)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let cluster = Arc::new(FakeCluster::new());
            let mut expected = 0;
            for (i, (os_index, has_labels, prelabeled)) in specs.iter().copied().enumerate() {
                let os = OS_DESCRIPTORS[os_index];
                let matches = os.contains("flatcar");
                let mut node = Node::new(format!("node-{i}"), os);
                if has_labels {
                    node = node.with_label("zone", "a");
                }
                if prelabeled && matches {
                    node = node.with_label(LABEL_KEY, LABEL_VALUE);
                }
                if matches {
                    expected += 1;
                }
                cluster.create_node(node).unwrap();
            }

            let harness = Harness::start(cluster.clone()).await;
            let converged = wait_for(|| harness.labeled_count() == expected, 3000).await;
            let labeled_before = cluster.patch_calls();

            // Drift on one matching node must be repaired as well
            let drifted = cluster
                .nodes_with_label(LABEL_KEY, LABEL_VALUE)
                .first()
                .map(|node| node.name.clone());
            if let Some(name) = &drifted {
                cluster
                    .apply_patch(name, &PatchDocument::remove_label(LABEL_KEY))
                    .unwrap();
            }
            let repaired = wait_for(|| harness.labeled_count() == expected, 3000).await;
            harness.stop().await;

            prop_assert!(converged, "labels did not converge");
            prop_assert!(repaired, "drift was not repaired");
            for node in cluster.list() {
                let matches = node.operating_system.contains("flatcar");
                prop_assert_eq!(node.label(LABEL_KEY) == Some(LABEL_VALUE), matches);
            }
            if drifted.is_some() {
                prop_assert_eq!(cluster.patch_calls(), labeled_before + 1);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
