pub mod config;
pub mod event;
pub mod node;
pub mod outcome;
pub mod patch;

pub use config::{
    Config, ControllerConfig, FeedConfig, KubeConfig, LoggingConfig, OsField, QueueConfig,
    TargetConfig,
};
pub use event::{Event, EventKind};
pub use node::Node;
pub use outcome::ReconcileOutcome;
pub use patch::{escape_json_pointer, PatchDocument, PatchOperation};
