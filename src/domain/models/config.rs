use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for flatcartag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Which nodes to label and with what
    #[serde(default)]
    pub target: TargetConfig,

    /// Worker and retry settings
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Work queue rate limiting
    #[serde(default)]
    pub queue: QueueConfig,

    /// Change feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Cluster connection
    #[serde(default)]
    pub kube: KubeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node info field holding the operating system descriptor to match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsField {
    /// `status.nodeInfo.operatingSystem`
    #[default]
    OperatingSystem,
    /// `status.nodeInfo.osImage`
    OsImage,
}

/// Target selection and label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TargetConfig {
    /// Case-sensitive substring the OS descriptor must contain
    #[serde(default = "default_os_signature")]
    pub os_signature: String,

    /// Which descriptor to match against
    #[serde(default)]
    pub os_field: OsField,

    /// Label key written on matching nodes
    #[serde(default = "default_label_key")]
    pub label_key: String,

    /// Label value written on matching nodes
    #[serde(default = "default_label_value")]
    pub label_value: String,
}

fn default_os_signature() -> String {
    "flatcar".to_string()
}

fn default_label_key() -> String {
    "k8c.io/uses-container-linux".to_string()
}

fn default_label_value() -> String {
    "true".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            os_signature: default_os_signature(),
            os_field: OsField::default(),
            label_key: default_label_key(),
            label_value: default_label_value(),
        }
    }
}

impl TargetConfig {
    /// Whether the node's configured OS descriptor contains the signature.
    pub fn matches(&self, node: &super::Node) -> bool {
        node.os_descriptor(self.os_field).contains(&self.os_signature)
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControllerConfig {
    /// Number of concurrent worker loops
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per event before it is dropped and reported
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a returned or panicked worker loop is restarted
    #[serde(default = "default_worker_restart_interval_ms")]
    pub worker_restart_interval_ms: u64,

    /// How often the cache-sync barrier polls the feed
    #[serde(default = "default_sync_poll_interval_ms")]
    pub sync_poll_interval_ms: u64,

    /// Upper bound on draining workers at shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

const fn default_workers() -> usize {
    1
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_worker_restart_interval_ms() -> u64 {
    1000
}

const fn default_sync_poll_interval_ms() -> u64 {
    100
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            worker_restart_interval_ms: default_worker_restart_interval_ms(),
            sync_poll_interval_ms: default_sync_poll_interval_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ControllerConfig {
    pub const fn worker_restart_interval(&self) -> Duration {
        Duration::from_millis(self.worker_restart_interval_ms)
    }

    pub const fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Work queue rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// First per-item retry delay in milliseconds; doubles on every failure
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the per-item retry delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Overall requeue rate across all items
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for the overall token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_base_delay_ms() -> u64 {
    5
}

const fn default_max_delay_ms() -> u64 {
    1_000_000
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_burst_size() -> u32 {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

impl QueueConfig {
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Change feed configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedConfig {
    /// Redeliver every cached node as an update on this period; 0 disables
    #[serde(default)]
    pub resync_period_secs: u64,
}

impl FeedConfig {
    pub const fn resync_period(&self) -> Option<Duration> {
        if self.resync_period_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.resync_period_secs))
        }
    }
}

/// Cluster connection configuration
///
/// With neither field set the client is inferred: in-cluster service account
/// first, then `$KUBECONFIG`, then `~/.kube/config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KubeConfig {
    /// Path to a kubeconfig file
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// API server address, overrides the kubeconfig's cluster URL
    #[serde(default)]
    pub master: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
