//! Service records
//!
//! A service record describes one discovered instance of a named service. The
//! discovery providers produce plain [`BaseService`] values; a pool's mutation
//! function may replace them with richer types (for example one holding an open
//! connection) as long as they implement [`Service`].

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One discovered instance of a service
#[async_trait]
pub trait Service: Send + Sync + fmt::Debug {
    /// Stable identity used for membership comparisons
    fn id(&self) -> &str;

    /// Dialable endpoint
    fn address(&self) -> &str;

    /// Opaque metadata attached by the discovery backend
    fn tags(&self) -> &HashSet<String>;

    /// Check if this instance has a specific tag
    fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(tag)
    }

    /// Probe the instance. Used by the membership list to jail and release
    /// services; a raw record has nothing to probe and reports healthy.
    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Shared handle to a service record
pub type ServiceRef = Arc<dyn Service>;

/// Plain service record as returned by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseService {
    id: String,
    address: String,
    tags: HashSet<String>,
}

impl BaseService {
    /// Create a new service record
    pub fn new<I, A>(id: I, address: A, tags: HashSet<String>) -> Self
    where
        I: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            address: address.into(),
            tags,
        }
    }

    /// Add a tag to this service record
    pub fn with_tag<T: Into<String>>(mut self, tag: T) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Wrap the record into a shared [`ServiceRef`]
    pub fn into_ref(self) -> ServiceRef {
        Arc::new(self)
    }
}

impl Service for BaseService {
    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn tags(&self) -> &HashSet<String> {
        &self.tags
    }
}

impl fmt::Display for BaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_service_creation() {
        let srv = BaseService::new("node-1", "10.0.0.1:9000", HashSet::new())
            .with_tag("primary")
            .with_tag("v2");

        assert_eq!(srv.id(), "node-1");
        assert_eq!(srv.address(), "10.0.0.1:9000");
        assert!(srv.has_tag("primary"));
        assert!(srv.has_tag("v2"));
        assert!(!srv.has_tag("v1"));
        assert_eq!(srv.to_string(), "node-1@10.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_base_service_reports_healthy() {
        let srv = BaseService::new("node-1", "10.0.0.1:9000", HashSet::new()).into_ref();
        assert!(srv.health_check().await.is_ok());
    }
}
