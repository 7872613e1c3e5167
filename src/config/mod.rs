//! # Configuration
//!
//! Environment-driven controller configuration. Everything has a sensible
//! default; nothing is required.

use crate::constants;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port the metrics/probe HTTP server listens on
    pub metrics_port: u16,
    /// Delay before restarting a failed watch stream
    pub watch_restart_delay_secs: u64,
    /// Reconciliation error backoff bounds (minutes)
    pub error_backoff_min_minutes: u64,
    pub error_backoff_max_minutes: u64,
}

impl ControllerConfig {
    /// Load configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            metrics_port: env_or("TRUST_STACK_METRICS_PORT", constants::DEFAULT_METRICS_PORT),
            watch_restart_delay_secs: env_or(
                "TRUST_STACK_WATCH_RESTART_DELAY_SECS",
                constants::DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            error_backoff_min_minutes: env_or(
                "TRUST_STACK_ERROR_BACKOFF_MIN_MINUTES",
                constants::DEFAULT_ERROR_BACKOFF_MIN_MINUTES,
            ),
            error_backoff_max_minutes: env_or(
                "TRUST_STACK_ERROR_BACKOFF_MAX_MINUTES",
                constants::DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
            ),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_env() {
        let config = ControllerConfig::from_env();
        assert_eq!(config.metrics_port, constants::DEFAULT_METRICS_PORT);
        assert_eq!(
            config.error_backoff_max_minutes,
            constants::DEFAULT_ERROR_BACKOFF_MAX_MINUTES
        );
    }
}
