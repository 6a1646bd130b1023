//! flatcartag - Flatcar Container Linux node labeler
//!
//! A Kubernetes controller that watches cluster nodes and adds the label
//! `k8c.io/uses-container-linux=true` to every node whose operating system
//! descriptor contains `flatcar`.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Node and event models, errors, and the port
//!   traits (`ChangeFeed`, `ObjectRepository`, `WorkQueue`, `ErrorReporter`)
//! - **Service Layer** (`services`): Event translation, reconciliation and the
//!   controller lifecycle
//! - **Infrastructure Layer** (`infrastructure`): Kubernetes adapters, the
//!   in-memory cluster, the rate-limited queue, configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flatcartag::infrastructure::memory::{FakeCluster, FakeNodeFeed};
//! use flatcartag::{Config, Controller};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cluster = Arc::new(FakeCluster::new());
//!     let feed = Arc::new(FakeNodeFeed::new(cluster.clone()));
//!     let controller = Controller::from_config(feed, cluster, &Config::default());
//!     controller.run(tokio_util::sync::CancellationToken::new()).await
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ControllerError, KeyError, ReconcileError};
pub use domain::models::{
    Config, ControllerConfig, Event, EventKind, Node, OsField, PatchDocument, QueueConfig,
    ReconcileOutcome, TargetConfig,
};
pub use domain::ports::{ChangeFeed, ErrorReporter, ObjectRepository, WorkQueue};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Controller, ControllerState, ControllerStats, EventTranslator, Reconciler};
