//! Orchestrator configuration: admission limits, timeouts, retry policy,
//! metrics pump cadence, and message bus log capacity.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub message_bus: MessageBusConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            default_timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
            monitoring: MonitoringConfig::default(),
            message_bus: MessageBusConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitoring_enabled")]
    pub enabled: bool,

    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: default_monitoring_enabled(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageBusConfig {
    #[serde(default = "default_max_log_size")]
    pub max_log_size: usize,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            max_log_size: default_max_log_size(),
        }
    }
}

fn default_max_concurrent_agents() -> usize {
    10
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    200
}
fn default_monitoring_enabled() -> bool {
    true
}
fn default_metrics_interval_secs() -> u64 {
    60
}
fn default_max_log_size() -> usize {
    1000
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl OrchestratorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_agents == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_concurrent_agents must be at least 1".to_string(),
            ));
        }
        if self.message_bus.max_log_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "message_bus.max_log_size must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        toml::from_str(
            r#"
            max_concurrent_agents = 5
            default_timeout_ms = 1000

            [retry]
            max_attempts = 2
            backoff_ms = 10

            [monitoring]
            enabled = false
            metrics_interval_secs = 5

            [message_bus]
            max_log_size = 50
            "#,
        )
        .expect("test_config literal must parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.max_concurrent_agents, 10);
        assert_eq!(cfg.message_bus.max_log_size, 1000);
        assert!(cfg.monitoring.enabled);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_str = r#"
            max_concurrent_agents = 3
        "#;
        let cfg: OrchestratorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.max_concurrent_agents, 3);
        assert_eq!(cfg.default_timeout_ms, default_timeout_ms());
        assert_eq!(cfg.retry.max_attempts, default_max_attempts());
    }

    #[test]
    fn load_from_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            max_concurrent_agents = 7

            [message_bus]
            max_log_size = 200
            "#
        )
        .unwrap();

        let cfg = OrchestratorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.max_concurrent_agents, 7);
        assert_eq!(cfg.message_bus.max_log_size, 200);
    }

    #[test]
    fn rejects_zero_max_concurrent_agents() {
        let mut cfg = OrchestratorConfig::default();
        cfg.max_concurrent_agents = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_helper_parses() {
        let cfg = OrchestratorConfig::test_config();
        assert_eq!(cfg.max_concurrent_agents, 5);
        assert!(!cfg.monitoring.enabled);
    }
}
