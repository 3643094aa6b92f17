//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check threshold ordering (warning < block <= max)
//! - Validate value ranges (durations > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into a guard

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("window.duration_ms must be greater than zero")]
    ZeroWindow,

    #[error("window.max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("window.warning_threshold ({warning}) must be below window.block_threshold ({block})")]
    WarningNotBelowBlock { warning: u32, block: u32 },

    #[error("window.block_threshold ({block}) must be below window.max_requests ({max})")]
    BlockNotBelowMax { block: u32, max: u32 },

    #[error("circuit.cooldown_ms must be greater than zero")]
    ZeroCooldown,

    #[error("circuit.failures_to_open must be at least 1")]
    ZeroFailureThreshold,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let window = &config.window;

    if window.duration_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if window.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }
    if window.warning_threshold >= window.block_threshold {
        errors.push(ValidationError::WarningNotBelowBlock {
            warning: window.warning_threshold,
            block: window.block_threshold,
        });
    }
    if window.block_threshold >= window.max_requests {
        errors.push(ValidationError::BlockNotBelowMax {
            block: window.block_threshold,
            max: window.max_requests,
        });
    }

    if config.circuit.cooldown_ms == 0 {
        errors.push(ValidationError::ZeroCooldown);
    }
    if config.circuit.failures_to_open == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = GuardConfig::default();
        config.window.duration_ms = 0;
        config.window.warning_threshold = 300;
        config.window.block_threshold = 600;
        config.circuit.failures_to_open = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroWindow,
                ValidationError::BlockNotBelowMax { block: 600, max: 500 },
                ValidationError::ZeroFailureThreshold,
            ]
        );
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let mut config = GuardConfig::default();
        config.window.warning_threshold = 250;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::WarningNotBelowBlock { warning: 250, block: 250 }]
        );
    }

    #[test]
    fn test_block_equal_to_max_rejected() {
        let mut config = GuardConfig::default();
        config.window.block_threshold = 500;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BlockNotBelowMax { block: 500, max: 500 }]
        );
        assert!(errors[0].to_string().contains("must be below"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GuardConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("not-an-address"));
    }
}
