//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the reconciliation engine depends on:
//! - ObjectRepository: reads and patches nodes in the cluster
//! - ChangeFeed: list/watch stream with a local read cache
//! - WorkQueue: de-duplicating, rate-limited retry queue
//! - ErrorReporter: process-wide sink for permanent failures
//!
//! Infrastructure adapters implement these; services only see the traits.

pub mod change_feed;
pub mod error_reporter;
pub mod object_repository;
pub mod work_queue;

pub use change_feed::{ChangeFeed, ResourceEventHandler};
pub use error_reporter::{ErrorReporter, LoggingErrorReporter};
pub use object_repository::ObjectRepository;
pub use work_queue::WorkQueue;
