//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<BalancerConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => BalancerConfig::default(),
    };

    let config = apply_overrides(config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay every recognized key found by `lookup` onto `config`.
pub fn apply_overrides<F>(mut config: BalancerConfig, lookup: F) -> Result<BalancerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Overrides { lookup };

    env.string("HOST", &mut config.listener.host);
    env.parse("PORT", &mut config.listener.port)?;

    env.parse("NODE_FILTER", &mut config.discovery.node_filter)?;
    env.string("ASG_NAME", &mut config.discovery.asg_name);
    env.string("TAG_NAME", &mut config.discovery.tag_name);
    env.string("TAG_VALUE", &mut config.discovery.tag_value);
    env.string("AWS_REGION", &mut config.discovery.region);
    env.parse("NODE_CHECK_PERIOD", &mut config.discovery.node_check_period_secs)?;
    env.string("NODE_INVENTORY", &mut config.discovery.inventory_path);
    env.parse("DISCOVERY_RETRY_BASE_MS", &mut config.discovery.retry_base_ms)?;

    env.parse("HEALTH_CHECK_PERIOD", &mut config.health_check.period_secs)?;
    env.string("HEALTH_CHECK_PATH", &mut config.health_check.path);
    env.parse("HEALTH_CHECK_TIMEOUT", &mut config.health_check.timeout_secs)?;

    env.parse("TARGET_PORT", &mut config.backend.target_port)?;
    env.parse("POOL_SIZE", &mut config.backend.pool_size)?;
    env.parse("POOL_TIMEOUT", &mut config.backend.pool_timeout_secs)?;

    env.parse("CIRCUIT_BREAKER_THRESHOLD", &mut config.circuit_breaker.threshold)?;
    env.parse("CIRCUIT_BREAKER_TIMEOUT", &mut config.circuit_breaker.timeout_mins)?;

    env.parse("SHUTDOWN_TIMEOUT", &mut config.shutdown.timeout_secs)?;

    env.string("LOG_LEVEL", &mut config.observability.log_level);
    env.parse("LOG_CONNECTIONS", &mut config.observability.log_connections)?;
    env.parse("METRICS_ENABLED", &mut config.observability.metrics_enabled)?;
    env.string("METRICS_ADDRESS", &mut config.observability.metrics_address);

    Ok(config)
}

struct Overrides<F> {
    lookup: F,
}

impl<F> Overrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &'static str, slot: &mut String) {
        if let Some(value) = (self.lookup)(key) {
            *slot = value;
        }
    }

    fn parse<T>(&self, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = (self.lookup)(key) {
            *slot = value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
