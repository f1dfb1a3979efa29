//! Service discovery configuration module
//!
//! This module defines configuration structures for discovery providers and
//! builds the configured provider.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::service::{BaseService, ServiceRef};
use crate::service_discovery::{
    DiscoveryOptions, ServiceDiscovery, StaticServiceDiscovery, TransportProtocol,
};

/// Consul service discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsulConfig {
    /// Consul HTTP API address
    #[serde(default = "default_consul_address")]
    pub address: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_consul_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Consul datacenter
    pub datacenter: Option<String>,
    /// Consul token for authentication
    pub token: Option<String>,
    /// Use https when the address carries no scheme
    #[serde(default)]
    pub tls_enabled: bool,
}

fn default_consul_address() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_consul_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: default_consul_address(),
            request_timeout_ms: default_consul_request_timeout_ms(),
            datacenter: None,
            token: None,
            tls_enabled: false,
        }
    }
}

impl ConsulConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "Consul request_timeout_ms must be greater than 0"
            ));
        }
        Ok(())
    }
}

/// Service discovery provider type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDiscoveryProvider {
    /// Consul service discovery
    #[default]
    Consul,
    /// Records listed in the configuration file
    Static,
}

impl std::fmt::Display for ServiceDiscoveryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceDiscoveryProvider::Consul => write!(f, "consul"),
            ServiceDiscoveryProvider::Static => write!(f, "static"),
        }
    }
}

/// One record of the static provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticServiceConfig {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Static discovery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub services: Vec<StaticServiceConfig>,
}

/// Discovery section of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub provider: ServiceDiscoveryProvider,
    #[serde(default)]
    pub transport: TransportProtocol,
    /// Path appended to every discovered address
    pub path_suffix: Option<String>,
    /// Fail provider construction when `path_suffix` is missing or empty
    #[serde(default)]
    pub require_path_suffix: bool,
    #[serde(default)]
    pub consul: ConsulConfig,
    #[serde(default, rename = "static")]
    pub static_services: StaticConfig,
}

impl DiscoveryConfig {
    /// Validate discovery configuration
    pub fn validate(&self) -> Result<()> {
        self.options().validate()?;

        match self.provider {
            ServiceDiscoveryProvider::Consul => {
                if cfg!(not(feature = "consul-discovery")) {
                    return Err(anyhow::anyhow!(
                        "Consul discovery not enabled. Enable the 'consul-discovery' feature to use Consul"
                    ));
                }
                self.consul.validate()?;
            }
            ServiceDiscoveryProvider::Static => {
                if self.static_services.services.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Static discovery requires at least one [[discovery.static.services]] entry"
                    ));
                }
                for srv in &self.static_services.services {
                    if srv.id.is_empty() || srv.address.is_empty() {
                        return Err(anyhow::anyhow!(
                            "Static service entries need a non-empty id and address"
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Path suffix options shared by all providers
    pub fn options(&self) -> DiscoveryOptions {
        match &self.path_suffix {
            Some(path) => DiscoveryOptions::with_path_suffix(path.clone()),
            None => DiscoveryOptions::none(),
        }
        .required(self.require_path_suffix || self.path_suffix.is_some())
    }

    /// Build the configured discovery provider for `service_name`
    pub fn build(&self, service_name: &str) -> Result<Arc<dyn ServiceDiscovery>> {
        match self.provider {
            #[cfg(feature = "consul-discovery")]
            ServiceDiscoveryProvider::Consul => {
                let discovery = crate::service_discovery::ConsulServiceDiscovery::with_config(
                    self.transport,
                    Some(self.options()),
                    self.consul.clone(),
                )?;
                Ok(Arc::new(discovery))
            }
            #[cfg(not(feature = "consul-discovery"))]
            ServiceDiscoveryProvider::Consul => Err(anyhow::anyhow!(
                "Consul discovery not enabled. Enable the 'consul-discovery' feature to use Consul"
            )),
            ServiceDiscoveryProvider::Static => {
                let opts = self.options();
                opts.validate()?;
                let services: Vec<ServiceRef> = self
                    .static_services
                    .services
                    .iter()
                    .map(|srv| {
                        let address = opts.apply(self.transport.format_address(&srv.address));
                        let tags: HashSet<String> = srv.tags.iter().cloned().collect();
                        BaseService::new(srv.id.clone(), address, tags).into_ref()
                    })
                    .collect();
                Ok(Arc::new(StaticServiceDiscovery::with_services(
                    service_name,
                    services,
                )))
            }
        }
    }
}
