//! Kubernetes adapters
//!
//! - Client bootstrap (kubeconfig file, inferred, master override)
//! - `ObjectRepository` over the node API
//! - `ChangeFeed` over the node watch

pub mod client;
mod convert;
pub mod node_informer;
pub mod node_repository;

pub use client::create_client;
pub use node_informer::KubeNodeInformer;
pub use node_repository::KubeNodeRepository;
