//! Common test utilities for integration tests
//!
//! Provides a controller harness over the in-memory cluster plus polling and
//! logging helpers shared by the integration test files.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flatcartag::domain::models::{ControllerConfig, Event, QueueConfig, TargetConfig};
use flatcartag::infrastructure::memory::{FakeCluster, FakeNodeFeed};
use flatcartag::infrastructure::queue::{default_controller_rate_limiter, RateLimitingQueue};
use flatcartag::{
    ControllerError, Controller, ControllerState, ErrorReporter, ObjectRepository, WorkQueue,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[allow(dead_code)]
pub const LABEL_KEY: &str = "k8c.io/uses-container-linux";
#[allow(dead_code)]
pub const LABEL_VALUE: &str = "true";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 10ms until it returns true or the timeout
/// (milliseconds) is reached.
#[allow(dead_code)]
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    predicate()
}

/// Error reporter that keeps every report for assertions
#[derive(Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<String>>,
}

impl RecordingReporter {
    #[allow(dead_code)]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &ControllerError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// Controller settings tuned for fast tests
pub fn fast_controller_config() -> ControllerConfig {
    ControllerConfig {
        workers: 2,
        worker_restart_interval_ms: 10,
        sync_poll_interval_ms: 5,
        shutdown_timeout_secs: 5,
        ..ControllerConfig::default()
    }
}

/// Queue with millisecond backoff
pub fn fast_queue() -> Arc<dyn WorkQueue<Event>> {
    Arc::new(RateLimitingQueue::new(default_controller_rate_limiter(
        &QueueConfig {
            base_delay_ms: 1,
            max_delay_ms: 10,
            ..QueueConfig::default()
        },
    )))
}

/// A running controller over an in-memory cluster
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub controller: Arc<Controller>,
    pub reporter: Arc<RecordingReporter>,
    shutdown: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

#[allow(dead_code)]
impl Harness {
    pub async fn start(cluster: Arc<FakeCluster>) -> Self {
        let repository: Arc<dyn ObjectRepository> = cluster.clone();
        Self::start_with(cluster, repository, fast_controller_config()).await
    }

    /// Start with a custom repository in front of the cluster.
    pub async fn start_with(
        cluster: Arc<FakeCluster>,
        repository: Arc<dyn ObjectRepository>,
        config: ControllerConfig,
    ) -> Self {
        let reporter = Arc::new(RecordingReporter::default());
        let controller = Arc::new(Controller::new(
            Arc::new(FakeNodeFeed::new(cluster.clone())),
            repository,
            fast_queue(),
            reporter.clone(),
            TargetConfig::default(),
            config,
        ));

        let mut states = controller.subscribe_state();
        let shutdown = CancellationToken::new();
        let handle = {
            let controller = controller.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { controller.run(shutdown).await })
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|state| *state == ControllerState::Running),
        )
        .await
        .expect("controller did not start in time")
        .expect("state channel closed");

        Self {
            cluster,
            controller,
            reporter,
            shutdown,
            handle,
        }
    }

    pub fn labeled_count(&self) -> usize {
        self.cluster.nodes_with_label(LABEL_KEY, LABEL_VALUE).len()
    }

    pub async fn stop(self) -> Arc<Controller> {
        self.shutdown.cancel();
        self.handle
            .await
            .expect("controller task panicked")
            .expect("controller run failed");
        self.controller
    }
}
