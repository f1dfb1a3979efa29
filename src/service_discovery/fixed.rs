//! In-memory discovery backed by a replaceable snapshot

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::service::ServiceRef;
use crate::service_discovery::{DiscoveryError, DiscoveryResult, ServiceDiscovery};

/// Discovery over a fixed set of records per service name.
///
/// The snapshot can be swapped at runtime, which makes it usable both for a
/// static deployment and for driving a pool in tests.
#[derive(Debug, Default)]
pub struct StaticServiceDiscovery {
    services: RwLock<HashMap<String, Vec<ServiceRef>>>,
    failure: RwLock<Option<String>>,
}

impl StaticServiceDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that already knows one service
    pub fn with_services<N: Into<String>>(name: N, services: Vec<ServiceRef>) -> Self {
        let provider = Self::new();
        provider.set_services(name, services);
        provider
    }

    /// Replace the snapshot returned for `name`
    pub fn set_services<N: Into<String>>(&self, name: N, services: Vec<ServiceRef>) {
        self.services.write().insert(name.into(), services);
    }

    /// Make every following `discover` call fail with a backend error until
    /// [`clear_failure`](Self::clear_failure) is called
    pub fn fail_with<M: Into<String>>(&self, message: M) {
        *self.failure.write() = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }
}

#[async_trait]
impl ServiceDiscovery for StaticServiceDiscovery {
    async fn discover(&self, service_name: &str) -> DiscoveryResult<Vec<ServiceRef>> {
        if let Some(message) = self.failure.read().clone() {
            return Err(DiscoveryError::backend(service_name, message));
        }

        match self.services.read().get(service_name) {
            Some(services) if !services.is_empty() => Ok(services.clone()),
            _ => Err(DiscoveryError::not_found(service_name)),
        }
    }

    fn driver(&self) -> &'static str {
        "static"
    }
}
