//! Change feed plumbing shared by the Kubernetes and in-memory feeds.

pub mod node_cache;

pub use node_cache::NodeCache;

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Resync ticker; `None` when resync is disabled.
pub fn resync_interval(period: Option<Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

/// Wait for the next resync tick, forever if resync is disabled.
pub async fn next_resync(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
