//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Kubernetes client, node repository and watching change feed
//! - In-memory cluster and change feed
//! - Node cache shared by both change feeds
//! - Rate-limited work queue
//! - Configuration management
//! - Logging infrastructure
//! - Process signal handling
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod informer;
pub mod k8s;
pub mod logging;
pub mod memory;
pub mod queue;
pub mod signals;
