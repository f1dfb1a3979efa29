//! # Configuration
//!
//! TOML configuration of the `service-pool` binary:
//!
//! - `pool`: service name, discovery interval, health checks switch
//! - `list`: health-check tuning of the default membership list
//! - `discovery`: provider selection and provider settings
//! - `logging`: log level and output format
//!
//! `${VAR}` and `${VAR:-default}` references are expanded before parsing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use service_pool::config::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file_with_env("config/service-pool.toml").await?;
//! println!("pooling {}", config.pool.name);
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod pool;
pub mod service_discovery;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub use logging::{LogFormat, LoggingConfig};
pub use pool::{ListConfig, PoolConfig};
pub use service_discovery::{
    ConsulConfig, DiscoveryConfig, ServiceDiscoveryProvider, StaticConfig, StaticServiceConfig,
};

use crate::pool::{MutationFn, PoolOptions};
use crate::service_discovery::ServiceDiscovery;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pool: PoolConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("read {}: {}", path.as_ref().display(), e))?;

        let config = Self::from_toml_str(&content)?;

        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse configuration text, expanding environment variables first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded_content = expand_env_vars(content);

        let mut config: Config = toml::from_str(&expanded_content)?;

        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Apply values derived from other settings
    fn apply_defaults(&mut self) {
        self.pool.name = self.pool.name.trim().to_string();

        // A check may not outlive the pause between two rounds
        if self.list.check_timeout_ms > self.list.check_interval_ms {
            warn!(
                "List check_timeout_ms ({}) exceeds check_interval_ms ({}), clamping",
                self.list.check_timeout_ms, self.list.check_interval_ms
            );
            self.list.check_timeout_ms = self.list.check_interval_ms;
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.list.validate()?;
        self.discovery.validate()?;
        self.logging.validate()?;

        if !self.pool.health_checks && self.list.try_up_tries > 0 {
            info!("Health checks disabled: list try_up_tries has no effect");
        }

        Ok(())
    }

    /// Build the configured discovery provider for the pooled service
    pub fn build_discovery(&self) -> Result<Arc<dyn ServiceDiscovery>> {
        self.discovery.build(&self.pool.name)
    }

    /// Pool options for the pooled service
    pub fn pool_options(
        &self,
        discovery: Arc<dyn ServiceDiscovery>,
        mutation: MutationFn,
    ) -> PoolOptions {
        PoolOptions::new(self.pool.name.clone(), discovery)
            .discovery_interval(self.pool.discovery_interval())
            .list_options(self.list.options())
            .mutation(mutation)
    }
}

/// Expand environment variables in configuration content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };

        result.push_str(&rest[..start]);
        let var_expr = &rest[start + 2..start + end];
        let replacement = match var_expr.split_once(":-") {
            Some((var_name, default_value)) => {
                env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            }
            None => env::var(var_expr).unwrap_or_else(|_| {
                warn!(
                    "Environment variable '{}' not found, using empty string",
                    var_expr
                );
                String::new()
            }),
        };
        result.push_str(&replacement);
        rest = &rest[start + end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    use crate::service_discovery::TransportProtocol;

    /// Helper function to create a temporary config file
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_basic_config_loading() {
        let config_content = r#"
[pool]
name = "billing"
discovery_interval_ms = 2000
health_checks = false

[list]
check_interval_ms = 5000
try_up_tries = 5
check_timeout_ms = 1000

[discovery]
provider = "consul"
transport = "http"
path_suffix = "/rpc"

[discovery.consul]
address = "http://consul.internal:8500"
datacenter = "eu-west"
request_timeout_ms = 3000

[logging]
level = "debug"
format = "json"
"#;

        let temp_file = create_temp_config_file(config_content);
        let config = Config::from_file_with_env(temp_file.path()).await.unwrap();

        assert_eq!(config.pool.name, "billing");
        assert_eq!(config.pool.discovery_interval(), Duration::from_secs(2));
        assert!(!config.pool.health_checks);
        assert_eq!(config.list.try_up_tries, 5);
        assert_eq!(config.discovery.provider, ServiceDiscoveryProvider::Consul);
        assert_eq!(config.discovery.transport, TransportProtocol::Http);
        assert_eq!(config.discovery.consul.address, "http://consul.internal:8500");
        assert_eq!(config.discovery.consul.datacenter.as_deref(), Some("eu-west"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn test_env_var_expansion() {
        env::set_var("SERVICE_POOL_TEST_NAME", "ledger");
        env::set_var("SERVICE_POOL_TEST_TOKEN", "s3cret");

        let config_content = r#"
[pool]
name = "${SERVICE_POOL_TEST_NAME}"

[discovery.consul]
address = "${SERVICE_POOL_TEST_CONSUL:-http://127.0.0.1:8500}"
token = "${SERVICE_POOL_TEST_TOKEN}"
"#;

        let temp_file = create_temp_config_file(config_content);
        let config = Config::from_file_with_env(temp_file.path()).await.unwrap();

        assert_eq!(config.pool.name, "ledger");
        assert_eq!(config.discovery.consul.address, "http://127.0.0.1:8500");
        assert_eq!(config.discovery.consul.token.as_deref(), Some("s3cret"));

        env::remove_var("SERVICE_POOL_TEST_NAME");
        env::remove_var("SERVICE_POOL_TEST_TOKEN");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml_str("[pool]\nname = \"billing\"\n").unwrap();

        assert_eq!(config.pool.discovery_interval_ms, 5000);
        assert!(config.pool.health_checks);
        assert_eq!(config.list.check_interval_ms, 10_000);
        assert_eq!(config.list.try_up_tries, 3);
        assert_eq!(config.list.check_timeout_ms, 2000);
        assert_eq!(config.discovery.provider, ServiceDiscoveryProvider::Consul);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_check_timeout_clamped_to_interval() {
        let config = Config::from_toml_str(
            "[pool]\nname = \"billing\"\n[list]\ncheck_interval_ms = 500\ncheck_timeout_ms = 2000\n",
        )
        .unwrap();

        assert_eq!(config.list.check_timeout_ms, 500);
    }

    #[test]
    fn test_expand_env_vars() {
        env::set_var("SERVICE_POOL_TEST_VAR", "test_value");

        let content = "host = \"${SERVICE_POOL_TEST_VAR}\"";
        assert_eq!(expand_env_vars(content), "host = \"test_value\"");

        let content_with_default = "host = \"${SERVICE_POOL_MISSING_VAR:-default_value}\"";
        assert_eq!(expand_env_vars(content_with_default), "host = \"default_value\"");

        // Unterminated reference is left as is
        assert_eq!(expand_env_vars("a = \"${OPEN\""), "a = \"${OPEN\"");

        env::remove_var("SERVICE_POOL_TEST_VAR");
    }

    #[test]
    fn test_config_validation() {
        // Missing pool section
        assert!(Config::from_toml_str("[list]\ntry_up_tries = 1\n").is_err());

        // Empty name
        assert!(Config::from_toml_str("[pool]\nname = \"\"\n").is_err());

        // Static provider without services
        let content = "[pool]\nname = \"billing\"\n[discovery]\nprovider = \"static\"\n";
        assert!(Config::from_toml_str(content).is_err());

        // Unknown provider
        let content = "[pool]\nname = \"billing\"\n[discovery]\nprovider = \"zookeeper\"\n";
        assert!(Config::from_toml_str(content).is_err());
    }

    #[tokio::test]
    async fn test_static_config_builds_pool() {
        let content = r#"
[pool]
name = "billing"
discovery_interval_ms = 100

[discovery]
provider = "static"

[[discovery.static.services]]
id = "billing-1"
address = "10.0.0.1:9000"
tags = ["primary"]

[[discovery.static.services]]
id = "billing-2"
address = "10.0.0.2:9000"
"#;
        let config = Config::from_toml_str(content).unwrap();
        let discovery = config.build_discovery().unwrap();
        let opts = config.pool_options(discovery, MutationFn::identity());

        assert_eq!(opts.discovery_interval, Duration::from_millis(100));
        assert_eq!(opts.list_options, Some(config.list.options()));

        let pool = crate::pool::ServicesPool::new(opts);
        pool.discover_services().await.unwrap();
        assert_eq!(pool.count(), 2);
    }
}
