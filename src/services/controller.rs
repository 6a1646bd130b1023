//! Node labeling controller.
//!
//! Wires the change feed, the event translator, the work queue and the
//! reconciler together and drives them through a small lifecycle:
//!
//! - **Created**: constructed, translator registered on the feed
//! - **Syncing**: feed running, waiting for its first full list
//! - **Running**: supervised workers draining the queue
//! - **ShuttingDown**: queue closed, workers finishing queued items
//! - **Stopped**: everything joined

use anyhow::{bail, Result};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::ControllerError;
use crate::domain::models::{Config, ControllerConfig, Event, ReconcileOutcome, TargetConfig};
use crate::domain::ports::{
    ChangeFeed, ErrorReporter, LoggingErrorReporter, ObjectRepository, WorkQueue,
};
use crate::infrastructure::queue::{default_controller_rate_limiter, RateLimitingQueue};
use crate::services::{EventTranslator, Reconciler};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Created,
    Syncing,
    Running,
    ShuttingDown,
    Stopped,
}

impl ControllerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Syncing => "syncing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Successful label patches
    pub labeled: u64,
    /// Events that needed no patch
    pub no_action: u64,
    /// Failed attempts, retried or not
    pub failed: u64,
    /// Failed attempts put back on the queue
    pub requeued: u64,
    /// Events given up on after the retry ceiling
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    labeled: AtomicU64,
    no_action: AtomicU64,
    failed: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Labeled => Self::bump(&self.labeled),
            ReconcileOutcome::NoActionNeeded => Self::bump(&self.no_action),
            ReconcileOutcome::Failed(_) => Self::bump(&self.failed),
        }
    }

    fn snapshot(&self) -> ControllerStats {
        ControllerStats {
            labeled: self.labeled.load(Ordering::Relaxed),
            no_action: self.no_action.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every worker task.
struct Worker {
    queue: Arc<dyn WorkQueue<Event>>,
    reconciler: Reconciler,
    reporter: Arc<dyn ErrorReporter>,
    stats: StatsCounters,
    max_retries: u32,
}

/// Marks the event done even if reconciling it panics.
struct DoneGuard<'a> {
    queue: &'a dyn WorkQueue<Event>,
    event: &'a Event,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.event);
    }
}

impl Worker {
    async fn process_next_item(&self) -> bool {
        let Some(event) = self.queue.get().await else {
            return false;
        };
        let _done = DoneGuard {
            queue: self.queue.as_ref(),
            event: &event,
        };

        let result = self.reconciler.process_item(&event).await;
        let outcome = ReconcileOutcome::from_result(&result);
        self.stats.record(&outcome);
        debug!(
            key = %event.key,
            outcome = outcome.as_str(),
            reason = outcome.reason(),
            "event processed"
        );

        match result {
            Ok(_) => self.queue.forget(&event),
            Err(err) => {
                let attempts = self.queue.num_requeues(&event).saturating_add(1);

                if attempts < self.max_retries {
                    warn!(
                        key = %event.key,
                        attempts,
                        error = %err,
                        "error processing event, will retry"
                    );
                    StatsCounters::bump(&self.stats.requeued);
                    self.queue.add_rate_limited(event.clone());
                } else {
                    self.queue.forget(&event);
                    StatsCounters::bump(&self.stats.dropped);
                    self.reporter.report(&ControllerError::RetriesExhausted {
                        key: event.key.clone(),
                        attempts,
                        source: err,
                    });
                }
            }
        }

        true
    }

    async fn run(self: Arc<Self>) {
        while self.process_next_item().await {}
    }
}

/// Restart a worker loop whenever it returns or panics, until shutdown.
async fn supervise(
    worker: Arc<Worker>,
    id: usize,
    restart_interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        match tokio::spawn(worker.clone().run()).await {
            Ok(()) => debug!(worker = id, "worker loop returned"),
            Err(err) if err.is_panic() => {
                worker.reporter.report(&ControllerError::WorkerPanicked {
                    worker: id,
                    message: panic_message(err.into_panic()),
                });
            }
            Err(err) => warn!(worker = id, error = %err, "worker task cancelled"),
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(restart_interval) => info!(worker = id, "restarting worker"),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// The node labeling controller.
pub struct Controller {
    feed: Arc<dyn ChangeFeed>,
    worker: Arc<Worker>,
    config: ControllerConfig,
    state: watch::Sender<ControllerState>,
}

impl Controller {
    /// Build a controller and register its event translator on `feed`.
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        repository: Arc<dyn ObjectRepository>,
        queue: Arc<dyn WorkQueue<Event>>,
        reporter: Arc<dyn ErrorReporter>,
        target: TargetConfig,
        config: ControllerConfig,
    ) -> Self {
        feed.add_event_handler(Arc::new(EventTranslator::new(
            queue.clone(),
            target.label_key.clone(),
        )));

        let worker = Arc::new(Worker {
            queue,
            reconciler: Reconciler::new(feed.clone(), repository, target),
            reporter,
            stats: StatsCounters::default(),
            max_retries: config.max_retries,
        });
        let (state, _) = watch::channel(ControllerState::Created);

        Self {
            feed,
            worker,
            config,
            state,
        }
    }

    /// Build a controller with the default rate-limited queue and a logging
    /// error reporter.
    pub fn from_config(
        feed: Arc<dyn ChangeFeed>,
        repository: Arc<dyn ObjectRepository>,
        config: &Config,
    ) -> Self {
        let queue: Arc<dyn WorkQueue<Event>> = Arc::new(RateLimitingQueue::new(
            default_controller_rate_limiter(&config.queue),
        ));
        Self::new(
            feed,
            repository,
            queue,
            Arc::new(LoggingErrorReporter),
            config.target.clone(),
            config.controller.clone(),
        )
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> ControllerStats {
        self.worker.stats.snapshot()
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue<Event>> {
        &self.worker.queue
    }

    /// Process one queued event. Returns `false` once the queue is shut down
    /// and drained.
    pub async fn process_next_item(&self) -> bool {
        self.worker.process_next_item().await
    }

    fn set_state(&self, state: ControllerState) {
        let previous = self.state.send_replace(state);
        debug!(from = %previous, to = %state, "controller state changed");
    }

    /// Run until `shutdown` is cancelled, then drain and stop.
    ///
    /// Can only be called once per controller.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let started = self.state.send_if_modified(|state| {
            if *state == ControllerState::Created {
                *state = ControllerState::Syncing;
                true
            } else {
                false
            }
        });
        if !started {
            bail!("controller already started (state: {})", self.state());
        }

        info!("starting node labeling controller");

        let feed_token = shutdown.child_token();
        let mut feed_task: JoinHandle<Result<()>> = {
            let feed = self.feed.clone();
            let token = feed_token.clone();
            tokio::spawn(async move { feed.run(token).await })
        };

        info!("waiting for node cache to sync");
        let synced = self.wait_for_sync(&shutdown, &feed_task).await;
        let workers: Vec<JoinHandle<()>> = if !synced && shutdown.is_cancelled() {
            info!("shutdown requested before node cache synced");
            Vec::new()
        } else {
            if synced {
                info!("node cache synced");
            } else {
                self.worker.reporter.report(&ControllerError::CacheSyncFailed);
            }

            self.set_state(ControllerState::Running);
            let workers: Vec<_> = (0..self.config.workers)
                .map(|id| {
                    tokio::spawn(supervise(
                        self.worker.clone(),
                        id,
                        self.config.worker_restart_interval(),
                        shutdown.clone(),
                    ))
                })
                .collect();
            info!(workers = workers.len(), "started workers");
            workers
        };

        shutdown.cancelled().await;

        self.set_state(ControllerState::ShuttingDown);
        info!(pending = self.worker.queue.len(), "shutting down workers");
        self.worker.queue.shut_down();

        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        let drain = async {
            for handle in workers {
                if let Err(err) = handle.await {
                    warn!(error = %err, "worker supervisor failed");
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout(), drain)
            .await
            .is_err()
        {
            warn!("workers did not stop in time, aborting");
            aborts.iter().for_each(tokio::task::AbortHandle::abort);
        }

        feed_token.cancel();
        match tokio::time::timeout(self.config.shutdown_timeout(), &mut feed_task).await {
            Ok(Ok(Ok(()))) => debug!("change feed stopped"),
            Ok(Ok(Err(err))) => error!(error = %err, "change feed failed"),
            Ok(Err(err)) => error!(error = %err, "change feed task failed"),
            Err(_) => {
                warn!("change feed did not stop in time, aborting");
                feed_task.abort();
            }
        }

        self.set_state(ControllerState::Stopped);
        let stats = self.stats();
        info!(
            labeled = stats.labeled,
            no_action = stats.no_action,
            failed = stats.failed,
            requeued = stats.requeued,
            dropped = stats.dropped,
            "controller stopped"
        );
        Ok(())
    }

    /// Poll the feed until synced. `false` on shutdown or if the feed exits
    /// first.
    async fn wait_for_sync(
        &self,
        shutdown: &CancellationToken,
        feed_task: &JoinHandle<Result<()>>,
    ) -> bool {
        loop {
            if self.feed.has_synced() {
                return true;
            }
            if shutdown.is_cancelled() || feed_task.is_finished() {
                return false;
            }
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(self.config.sync_poll_interval()) => {}
            }
        }
    }
}
