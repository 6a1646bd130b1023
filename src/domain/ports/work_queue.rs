use async_trait::async_trait;
use std::time::Duration;

/// Port for a de-duplicating, rate-limited work queue
///
/// Contract implementations must honour, for concurrent producers and
/// consumers:
/// - an item added while already queued is stored once;
/// - an item handed out by [`get`](WorkQueue::get) is never handed to another
///   consumer until [`done`](WorkQueue::done) is called for it;
/// - an item added while being processed is held and queued again on `done`;
/// - after [`shut_down`](WorkQueue::shut_down) new items are ignored, queued
///   items are still handed out, and `get` returns `None` once empty.
///
/// # Examples
///
/// ```no_run
/// use flatcartag::domain::ports::WorkQueue;
///
/// async fn drain(queue: &dyn WorkQueue<String>) {
///     while let Some(item) = queue.get().await {
///         println!("processing {item}");
///         queue.forget(&item);
///         queue.done(&item);
///     }
/// }
/// ```
#[async_trait]
pub trait WorkQueue<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Mark an item as needing processing
    fn add(&self, item: T);

    /// Add an item once `delay` has elapsed
    fn add_after(&self, item: T, delay: Duration);

    /// Add an item after the rate limiter says it may be retried
    fn add_rate_limited(&self, item: T);

    /// Block until an item is available
    ///
    /// # Returns
    ///
    /// * `Some(T)` - The next item, now marked as processing
    /// * `None` - The queue is shut down and empty
    async fn get(&self) -> Option<T>;

    /// Mark an item as finished processing
    fn done(&self, item: &T);

    /// Clear the item's retry history
    fn forget(&self, item: &T);

    /// Number of times the item has been requeued through the rate limiter
    fn num_requeues(&self, item: &T) -> u32;

    /// Number of items waiting to be handed out
    fn len(&self) -> usize;

    /// Whether no items are waiting
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting items and wake blocked consumers
    fn shut_down(&self);

    fn is_shutting_down(&self) -> bool;
}
