//! Layered configuration loading.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::CommunicationPath;

/// Project directory holding configuration, artifacts and logs.
pub const PROJECT_DIR: &str = ".hivelink";

/// Prefix of environment overrides, e.g. `HIVELINK_TRAINER__MIN_EXAMPLES`.
pub const ENV_PREFIX: &str = "HIVELINK_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid {field}: {value}. Must be greater than zero")]
    NotPositive { field: &'static str, value: String },

    #[error("Invalid validation_ratio: {0}. Must be strictly between 0 and 1")]
    InvalidValidationRatio(f64),

    #[error("Invalid acceptance_threshold: {0}. Must be between 0 and 1")]
    InvalidAcceptanceThreshold(f64),

    #[error("Invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("Store path cannot be empty")]
    EmptyStorePath,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .hivelink/config.yaml
    /// 3. .hivelink/local.yaml
    /// 4. Environment variables (HIVELINK_* prefix, `__` between sections)
    ///
    /// An explicit `config_file` replaces both YAML layers.
    pub fn load(config_file: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_in(Path::new("."), config_file)
    }

    /// Same as [`ConfigLoader::load`], rooted at `project_root`.
    pub fn load_in(project_root: &Path, config_file: Option<&Path>) -> Result<Config, ConfigError> {
        let config: Config = Self::figment(project_root, config_file)
            .extract()
            .map_err(Box::new)?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(project_root: &Path, config_file: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let figment = match config_file {
            Some(file) => figment.merge(Yaml::file(file)),
            None => {
                let dir = project_root.join(PROJECT_DIR);
                figment
                    .merge(Yaml::file(dir.join("config.yaml")))
                    .merge(Yaml::file(dir.join("local.yaml")))
            }
        };

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if !["json", "pretty"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if !["daily", "hourly", "never"].contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        positive("transport.default_timeout_ms", config.transport.default_timeout_ms)?;
        positive("transport.latency_budget_ms", config.transport.latency_budget_ms)?;
        positive("transport.max_response_bytes", config.transport.max_response_bytes as u64)?;
        positive(
            "circuit_breaker.failure_threshold",
            u64::from(config.circuit_breaker.failure_threshold),
        )?;
        positive("circuit_breaker.cooldown_ms", config.circuit_breaker.cooldown_ms)?;

        let trainer = &config.trainer;
        if !(trainer.validation_ratio > 0.0 && trainer.validation_ratio < 1.0) {
            return Err(ConfigError::InvalidValidationRatio(trainer.validation_ratio));
        }
        if !(0.0..=1.0).contains(&trainer.acceptance_threshold) {
            return Err(ConfigError::InvalidAcceptanceThreshold(trainer.acceptance_threshold));
        }
        positive("trainer.min_examples", trainer.min_examples as u64)?;
        positive("trainer.max_concurrency", trainer.max_concurrency as u64)?;
        positive("trainer.call_timeout_ms", trainer.call_timeout_ms)?;

        if config.store.path.trim().is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }

        for route in &config.routes {
            let path: CommunicationPath = route.parse().map_err(|e: crate::domain::errors::RoutingError| {
                ConfigError::InvalidRoute {
                    route: route.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !path.is_downward() {
                return Err(ConfigError::InvalidRoute {
                    route: route.clone(),
                    reason: "routes must point down the hierarchy".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BackendKind, StoreKind};
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.latency_budget_ms, 250);
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
logging:
  level: debug
  format: json
transport:
  latency_budget_ms: 500
trainer:
  validation_ratio: 0.25
  requests_per_minute: 30
backend:
  kind: mock
routes:
  - queen:princess-dev
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.transport.latency_budget_ms, 500);
        assert_eq!(config.transport.default_timeout_ms, 30_000);
        assert_eq!(config.trainer.requests_per_minute, Some(30));
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.routes, vec!["queen:princess-dev".to_string()]);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
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
    fn test_validate_zero_budget() {
        let mut config = Config::default();
        config.transport.latency_budget_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::NotPositive {
                field: "transport.latency_budget_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_validation_ratio() {
        for ratio in [0.0, 1.0, -0.1, f64::NAN] {
            let mut config = Config::default();
            config.trainer.validation_ratio = ratio;
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidValidationRatio(_))
            ));
        }
    }

    #[test]
    fn test_validate_routes() {
        let mut config = Config::default();
        config.routes = vec!["drone:queen".to_string()];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRoute { .. })
        ));

        config.routes = vec!["queen-princess-dev".to_string()];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRoute { .. })
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(PROJECT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.yaml"),
            "logging:\n  level: warn\n  format: json\ntransport:\n  latency_budget_ms: 400\n",
        )
        .unwrap();
        fs::write(dir.join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        let config = ConfigLoader::load_in(root.path(), None).unwrap();
        assert_eq!(config.logging.level, "debug", "local overrides project config");
        assert_eq!(config.logging.format, "json", "unset fields keep lower layers");
        assert_eq!(config.transport.latency_budget_ms, 400);
    }

    #[test]
    fn test_explicit_file_replaces_project_layers() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(PROJECT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "transport:\n  latency_budget_ms: 400\n").unwrap();

        let explicit = root.path().join("ci.yaml");
        fs::write(&explicit, "trainer:\n  min_examples: 8\n").unwrap();

        let config = ConfigLoader::load_in(root.path(), Some(&explicit)).unwrap();
        assert_eq!(config.trainer.min_examples, 8);
        assert_eq!(config.transport.latency_budget_ms, 250);
    }

    #[test]
    fn test_env_overrides_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(PROJECT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "trainer:\n  call_timeout_ms: 4000\n").unwrap();

        temp_env::with_vars(
            [
                ("HIVELINK_TRAINER__CALL_TIMEOUT_MS", Some("12")),
                ("HIVELINK_BACKEND__KIND", Some("mock")),
            ],
            || {
                let config = ConfigLoader::load_in(root.path(), None).unwrap();
                assert_eq!(config.trainer.call_timeout_ms, 12);
                assert_eq!(config.backend.kind, BackendKind::Mock);
            },
        );
    }

    #[test]
    fn test_invalid_env_value_is_extract_error() {
        let root = tempfile::tempdir().unwrap();
        temp_env::with_var("HIVELINK_CIRCUIT_BREAKER__COOLDOWN_MS", Some("soon"), || {
            assert!(matches!(
                ConfigLoader::load_in(root.path(), None),
                Err(ConfigError::Extract(_))
            ));
        });
    }
}
