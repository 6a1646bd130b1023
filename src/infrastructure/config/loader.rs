use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "flatcartag.yaml";

/// Prefix for environment overrides; nested keys are split on `__`
pub const ENV_PREFIX: &str = "FLATCARTAG_";

const MAX_WORKERS: usize = 64;
const MAX_LABEL_NAME_LEN: usize = 63;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid workers: {0}. Must be between 1 and {MAX_WORKERS}")]
    InvalidWorkers(usize),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("OS signature cannot be empty")]
    EmptyOsSignature,

    #[error("Invalid label key: {0:?}")]
    InvalidLabelKey(String),

    #[error("Invalid label value: {0:?}. At most {MAX_LABEL_NAME_LEN} characters")]
    InvalidLabelValue(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid requests_per_second: {0}. Must be at least 1")]
    InvalidRateLimit(u32),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid backoff configuration: base_delay_ms ({0}) must be less than max_delay_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Values given on the command line, applied above every other layer
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub log_level: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub master: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.controller.workers = workers;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(path) = self.kubeconfig {
            config.kube.kubeconfig = Some(path);
        }
        if let Some(master) = self.master {
            config.kube.master = Some(master);
        }
    }
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `flatcartag.yaml` in the working directory (optional)
    /// 3. The file passed with `--config` (must exist when given)
    /// 4. Environment variables (`FLATCARTAG_*`, highest file-free layer)
    /// 5. Command line overrides
    pub fn load(explicit: Option<&Path>, overrides: ConfigOverrides) -> Result<Config> {
        Self::load_layered(Path::new(DEFAULT_CONFIG_FILE), explicit, overrides)
    }

    /// Same as [`ConfigLoader::load`] with an arbitrary project file path
    pub fn load_layered(
        project: &Path,
        explicit: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project));

        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let mut config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        overrides.apply(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let controller = &config.controller;
        if controller.workers == 0 || controller.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkers(controller.workers));
        }
        if controller.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(controller.max_retries));
        }
        if controller.sync_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "controller.sync_poll_interval_ms must be positive".to_string(),
            ));
        }

        let target = &config.target;
        if target.os_signature.trim().is_empty() {
            return Err(ConfigError::EmptyOsSignature);
        }
        if !is_valid_label_key(&target.label_key) {
            return Err(ConfigError::InvalidLabelKey(target.label_key.clone()));
        }
        if target.label_value.len() > MAX_LABEL_NAME_LEN {
            return Err(ConfigError::InvalidLabelValue(target.label_value.clone()));
        }

        let queue = &config.queue;
        if queue.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(queue.requests_per_second));
        }
        if queue.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(queue.burst_size));
        }
        if queue.base_delay_ms >= queue.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                queue.base_delay_ms,
                queue.max_delay_ms,
            ));
        }

        if config
            .kube
            .master
            .as_deref()
            .is_some_and(|master| master.trim().is_empty())
        {
            return Err(ConfigError::ValidationFailed(
                "kube.master cannot be empty".to_string(),
            ));
        }

        let logging = &config.logging;
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(logging.rotation.clone()));
        }

        Ok(())
    }
}

/// `[prefix/]name` with a non-empty name of at most 63 characters.
fn is_valid_label_key(key: &str) -> bool {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    let name_ok = !name.is_empty()
        && name.len() <= MAX_LABEL_NAME_LEN
        && !name.contains('/')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    let prefix_ok = prefix.is_none_or(|prefix| !prefix.is_empty() && !prefix.contains(' '));

    name_ok && prefix_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::OsField;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    fn missing_project_file() -> PathBuf {
        PathBuf::from("/nonexistent/flatcartag.yaml")
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target.os_signature, "flatcar");
        assert_eq!(config.target.label_key, "k8c.io/uses-container-linux");
        assert_eq!(config.target.label_value, "true");
        assert_eq!(config.controller.workers, 1);
        assert_eq!(config.controller.max_retries, 5);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
target:
  os_signature: Flatcar Container Linux
  os_field: os_image
controller:
  workers: 4
  max_retries: 3
queue:
  requests_per_second: 50
  burst_size: 200
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.target.os_signature, "Flatcar Container Linux");
        assert_eq!(config.target.os_field, OsField::OsImage);
        assert_eq!(config.target.label_key, "k8c.io/uses-container-linux");
        assert_eq!(config.controller.workers, 4);
        assert_eq!(config.controller.max_retries, 3);
        assert_eq!(config.queue.requests_per_second, 50);
        assert_eq!(config.queue.burst_size, 200);
        assert_eq!(config.logging.format, "pretty");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_workers() {
        for workers in [0, MAX_WORKERS + 1] {
            let mut config = Config::default();
            config.controller.workers = workers;
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidWorkers(w)) if w == workers
            ));
        }
    }

    #[test]
    fn test_validate_zero_max_retries() {
        let mut config = Config::default();
        config.controller.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_validate_empty_signature() {
        let mut config = Config::default();
        config.target.os_signature = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyOsSignature)
        ));
    }

    #[test]
    fn test_validate_label_key() {
        for key in ["", "k8c.io/", "/name", "a/b/c", "bad key"] {
            let mut config = Config::default();
            config.target.label_key = key.to_string();
            assert!(
                matches!(
                    ConfigLoader::validate(&config),
                    Err(ConfigError::InvalidLabelKey(_))
                ),
                "{key:?} should be rejected"
            );
        }

        let mut config = Config::default();
        config.target.label_key = "container-linux".to_string();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_long_label_value() {
        let mut config = Config::default();
        config.target.label_value = "x".repeat(64);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLabelValue(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_validate_rate_limits() {
        let mut config = Config::default();
        config.queue.requests_per_second = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(0))
        ));

        let mut config = Config::default();
        config.queue.burst_size = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBurstSize(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.queue.base_delay_ms = 1000;
        config.queue.max_delay_ms = 10;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(1000, 10))
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let project = yaml_file("controller:\n  workers: 2\nlogging:\n  level: warn\n  format: pretty\n");
        let explicit = yaml_file("controller:\n  workers: 3\n");

        let config = temp_env::with_vars(
            [
                ("FLATCARTAG_LOGGING__LEVEL", Some("debug")),
                ("FLATCARTAG_TARGET__LABEL_VALUE", Some("yes")),
            ],
            || {
                ConfigLoader::load_layered(
                    project.path(),
                    Some(explicit.path()),
                    ConfigOverrides::default(),
                )
            },
        )
        .unwrap();

        assert_eq!(config.controller.workers, 3, "Explicit file should win");
        assert_eq!(config.logging.level, "debug", "Environment should win");
        assert_eq!(
            config.logging.format, "pretty",
            "Project value should persist when not overridden"
        );
        assert_eq!(config.target.label_value, "yes");
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = temp_env::with_var("FLATCARTAG_CONTROLLER__WORKERS", Some("2"), || {
            ConfigLoader::load_layered(
                &missing_project_file(),
                None,
                ConfigOverrides {
                    workers: Some(8),
                    log_level: Some("trace".to_string()),
                    kubeconfig: Some(PathBuf::from("/tmp/kubeconfig")),
                    master: Some("https://10.0.0.1:6443".to_string()),
                },
            )
        })
        .unwrap();

        assert_eq!(config.controller.workers, 8);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(
            config.kube.kubeconfig.as_deref(),
            Some(Path::new("/tmp/kubeconfig"))
        );
        assert_eq!(config.kube.master.as_deref(), Some("https://10.0.0.1:6443"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = ConfigLoader::load_layered(
            &missing_project_file(),
            Some(Path::new("/nonexistent/explicit.yaml")),
            ConfigOverrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let explicit = yaml_file("queue:\n  burst_size: 0\n");
        let result = ConfigLoader::load_layered(
            &missing_project_file(),
            Some(explicit.path()),
            ConfigOverrides::default(),
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidBurstSize(0))
        ));
    }
}
