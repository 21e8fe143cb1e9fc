//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (periods and timeouts > 0, ports valid)
//! - Check the selected discovery strategy has its inputs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BalancerConfig, NodeFilter};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("HEALTH_CHECK_PATH must start with '/', got '{0}'")]
    RelativeHealthPath(String),

    #[error("METRICS_ADDRESS '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::Empty("HOST"));
    }
    if config.backend.target_port == 0 {
        errors.push(ValidationError::Zero("TARGET_PORT"));
    }
    if config.backend.pool_timeout_secs == 0 {
        errors.push(ValidationError::Zero("POOL_TIMEOUT"));
    }

    let discovery = &config.discovery;
    match discovery.node_filter {
        NodeFilter::Asg if discovery.asg_name.trim().is_empty() => {
            errors.push(ValidationError::Empty("ASG_NAME"));
        }
        NodeFilter::Tag if discovery.tag_name.trim().is_empty() => {
            errors.push(ValidationError::Empty("TAG_NAME"));
        }
        _ => {}
    }
    if discovery.region.trim().is_empty() {
        errors.push(ValidationError::Empty("AWS_REGION"));
    }
    if discovery.node_check_period_secs == 0 {
        errors.push(ValidationError::Zero("NODE_CHECK_PERIOD"));
    }

    let health = &config.health_check;
    if health.period_secs == 0 {
        errors.push(ValidationError::Zero("HEALTH_CHECK_PERIOD"));
    }
    if health.timeout_secs == 0 {
        errors.push(ValidationError::Zero("HEALTH_CHECK_TIMEOUT"));
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::RelativeHealthPath(health.path.clone()));
    }

    if config.circuit_breaker.threshold == 0 {
        errors.push(ValidationError::Zero("CIRCUIT_BREAKER_THRESHOLD"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
