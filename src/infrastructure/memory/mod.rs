//! In-memory adapters for tests and local experiments.

pub mod fake_cluster;

pub use fake_cluster::{ClusterEvent, FakeCluster, FakeNodeFeed};
