use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::ListOptions;

/// Pool section of the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Name of the service to discover
    pub name: String,
    /// Pause between two discovery cycles in milliseconds
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
    /// Run the membership list's health-check loop
    #[serde(default = "default_true")]
    pub health_checks: bool,
}

fn default_discovery_interval_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl PoolConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Pool name cannot be empty"));
        }

        if self.discovery_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Pool discovery_interval_ms must be greater than 0"
            ));
        }

        Ok(())
    }
}

/// Membership list section of the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListConfig {
    /// Pause between two health-check rounds in milliseconds
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Failed checks before a jailed service is dropped (0 keeps it)
    #[serde(default = "default_try_up_tries")]
    pub try_up_tries: u32,
    /// Upper bound of a single health check in milliseconds
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_check_interval_ms() -> u64 {
    10_000
}

fn default_try_up_tries() -> u32 {
    3
}

fn default_check_timeout_ms() -> u64 {
    2_000
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            try_up_tries: default_try_up_tries(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

impl ListConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.check_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "List check_interval_ms must be greater than 0"
            ));
        }

        if self.check_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "List check_timeout_ms must be greater than 0"
            ));
        }

        Ok(())
    }

    pub fn options(&self) -> ListOptions {
        ListOptions {
            check_interval: Duration::from_millis(self.check_interval_ms),
            try_up_tries: self.try_up_tries,
            check_timeout: Duration::from_millis(self.check_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config: PoolConfig = toml::from_str("name = \"billing\"").unwrap();
        assert_eq!(config.discovery_interval(), Duration::from_secs(5));
        assert!(config.health_checks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_config_validation() {
        let config = PoolConfig {
            name: " ".to_string(),
            discovery_interval_ms: 1000,
            health_checks: false,
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            name: "billing".to_string(),
            discovery_interval_ms: 0,
            health_checks: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_list_config_to_options() {
        let config = ListConfig {
            check_interval_ms: 500,
            try_up_tries: 0,
            check_timeout_ms: 100,
        };
        let opts = config.options();
        assert_eq!(opts.check_interval, Duration::from_millis(500));
        assert_eq!(opts.try_up_tries, 0);
        assert_eq!(opts.check_timeout, Duration::from_millis(100));

        assert_eq!(ListConfig::default().options(), ListOptions::default());
    }
}
