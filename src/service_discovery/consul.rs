//! Consul service discovery implementation
//!
//! Queries the Consul health endpoint for passing instances of a service and
//! turns every entry into a [`BaseService`].

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use crate::config::service_discovery::ConsulConfig;
use crate::service::{BaseService, ServiceRef};
use crate::service_discovery::{
    DiscoveryError, DiscoveryOptions, DiscoveryResult, ServiceDiscovery, TransportProtocol,
};

const DRIVER_CONSUL: &str = "consul";

/// Entry of `/v1/health/service/:service`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulServiceEntry {
    #[serde(default)]
    node: Option<ConsulNode>,
    service: ConsulAgentService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulNode {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulAgentService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Consul service discovery implementation
pub struct ConsulServiceDiscovery {
    config: ConsulConfig,
    base_url: reqwest::Url,
    transport: TransportProtocol,
    opts: DiscoveryOptions,
    client: reqwest::Client,
}

impl std::fmt::Debug for ConsulServiceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulServiceDiscovery")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("opts", &self.opts)
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl ConsulServiceDiscovery {
    /// Create a Consul-driven discovery from exactly one agent address.
    /// An empty address keeps the default agent address.
    pub fn new(
        transport: TransportProtocol,
        opts: Option<DiscoveryOptions>,
        addrs: &[&str],
    ) -> DiscoveryResult<Self> {
        if addrs.len() != 1 {
            return Err(DiscoveryError::InvalidArgumentsLength {
                length: addrs.len(),
                driver: DRIVER_CONSUL.to_string(),
            });
        }

        let mut config = ConsulConfig::default();
        if !addrs[0].is_empty() {
            config.address = addrs[0].to_string();
        }

        Self::with_config(transport, opts, config)
    }

    /// Create a Consul-driven discovery from a full configuration
    pub fn with_config(
        transport: TransportProtocol,
        opts: Option<DiscoveryOptions>,
        mut config: ConsulConfig,
    ) -> DiscoveryResult<Self> {
        let opts = opts.unwrap_or_default();
        opts.validate()?;

        if !config.address.contains("://") {
            let scheme = if config.tls_enabled { "https" } else { "http" };
            config.address = format!("{}://{}", scheme, config.address);
        }

        let base_url = reqwest::Url::parse(&config.address).map_err(|e| {
            DiscoveryError::Configuration(format!(
                "invalid consul address {}: {}",
                config.address, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DiscoveryError::Configuration(format!(
                "invalid consul address {}",
                config.address
            )));
        }

        let client = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                DiscoveryError::Configuration(format!("connect to consul discovery: {}", e))
            })?;

        Ok(Self {
            config,
            base_url,
            transport,
            opts,
            client,
        })
    }

    /// Agent address queried by this provider
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Health endpoint of `service_name`, with the name percent-encoded as a
    /// single path segment
    fn health_url(&self, service_name: &str) -> DiscoveryResult<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DiscoveryError::backend(service_name, "consul address cannot carry a path")
            })?
            .pop_if_empty()
            .extend(["v1", "health", "service", service_name]);
        Ok(url)
    }

    fn service_from_entry(&self, entry: ConsulServiceEntry) -> ServiceRef {
        let host = if entry.service.address.is_empty() {
            entry.node.map(|n| n.address).unwrap_or_default()
        } else {
            entry.service.address
        };

        let addr = format!(
            "{}:{}",
            self.transport.format_address(&host),
            entry.service.port
        );
        let addr = self.opts.apply(addr);

        debug!(id = %entry.service.id, address = %addr, "discovered service");

        let tags: HashSet<String> = entry.service.tags.unwrap_or_default().into_iter().collect();

        BaseService::new(entry.service.id, addr, tags).into_ref()
    }
}

#[async_trait]
impl ServiceDiscovery for ConsulServiceDiscovery {
    async fn discover(&self, service_name: &str) -> DiscoveryResult<Vec<ServiceRef>> {
        let url = self.health_url(service_name)?;
        let mut request = self.client.get(url).query(&[("passing", "true")]);

        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header("X-Consul-Token", token);
        }

        if let Some(dc) = self.config.datacenter.as_deref().filter(|dc| !dc.is_empty()) {
            request = request.query(&[("dc", dc)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DiscoveryError::backend(service_name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::backend(
                service_name,
                format!("consul API error: HTTP {}", response.status()),
            ));
        }

        let entries: Vec<ConsulServiceEntry> = response.json().await.map_err(|e| {
            DiscoveryError::backend(service_name, format!("parse consul response: {}", e))
        })?;

        if entries.is_empty() {
            return Err(DiscoveryError::not_found(service_name));
        }

        Ok(entries
            .into_iter()
            .map(|entry| self.service_from_entry(entry))
            .collect())
    }

    fn driver(&self) -> &'static str {
        DRIVER_CONSUL
    }
}
