//! In-process implementation of the [`WorkQueue`] port.
//!
//! Items move through three sets guarded by one mutex:
//! - `queue`: FIFO of items ready to be handed out;
//! - `dirty`: items that need processing (everything in `queue`, plus items
//!   re-added while they were being processed);
//! - `processing`: items handed out and not yet `done`.
//!
//! An item is in `queue` only if it is dirty and not processing, which is what
//! keeps one key from reaching two workers at the same time.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use super::rate_limiter::RateLimiter;
use crate::domain::ports::WorkQueue;

struct QueueState<T> {
    queue: VecDeque<T>,
    dirty: HashSet<T>,
    processing: HashSet<T>,
    shutting_down: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> Shared<T>
where
    T: Eq + Hash + Clone,
{
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, item: T) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.notify.notify_one();
    }
}

/// De-duplicating, rate-limited work queue.
///
/// Cloning is cheap and clones share the same queue.
pub struct RateLimitingQueue<T> {
    shared: Arc<Shared<T>>,
    rate_limiter: Arc<dyn RateLimiter<T>>,
}

impl<T> Clone for RateLimitingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }
    }
}

impl<T> RateLimitingQueue<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(rate_limiter: impl RateLimiter<T> + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
            }),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Number of items currently handed out and not yet done.
    pub fn processing_len(&self) -> usize {
        self.shared.lock().processing.len()
    }
}

#[async_trait]
impl<T> WorkQueue<T> for RateLimitingQueue<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn add(&self, item: T) {
        self.shared.add(item);
    }

    fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.shared.add(item);
            return;
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.add(item);
        });
    }

    fn add_rate_limited(&self, item: T) {
        let delay = self.rate_limiter.when(&item);
        self.add_after(item, delay);
    }

    async fn get(&self) -> Option<T> {
        loop {
            // Register interest before inspecting state so a notification
            // sent between the check and the await is not lost.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    fn done(&self, item: &T) {
        let mut state = self.shared.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    fn forget(&self, item: &T) {
        self.rate_limiter.forget(item);
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.rate_limiter.num_requeues(item)
    }

    fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    fn shut_down(&self) {
        self.shared.lock().shutting_down = true;
        self.shared.notify.notify_waiters();
    }

    fn is_shutting_down(&self) -> bool {
        self.shared.lock().shutting_down
    }
}
