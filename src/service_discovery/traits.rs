//! Core traits and types for service discovery
//!
//! This module defines the common interface that all discovery providers
//! must follow, along with the shared error type.

use async_trait::async_trait;

use crate::service::ServiceRef;

/// Service discovery error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("invalid arguments length {length} for {driver} discovery driver, expected exactly 1")]
    InvalidArgumentsLength { length: usize, driver: String },

    #[error("optional path is required but empty")]
    EmptyOptionalPath,

    #[error("service {service} not found")]
    ServiceNotFound { service: String },

    #[error("discover {service} service: {message}")]
    Backend { service: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DiscoveryError {
    /// Create a backend error for the given service
    pub fn backend<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::Backend {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for the given service
    pub fn not_found<S: Into<String>>(service: S) -> Self {
        Self::ServiceNotFound {
            service: service.into(),
        }
    }

    /// True when the backend answered but had no active instances
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiscoveryError::ServiceNotFound { .. })
    }
}

/// Result type for service discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Source of truth for which instances of a named service are active
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Discover all active instances of a service by name
    ///
    /// Implementations must return [`DiscoveryError::ServiceNotFound`] rather
    /// than an empty list, and wrap transport failures with the service name.
    /// No ordering is guaranteed.
    async fn discover(&self, service_name: &str) -> DiscoveryResult<Vec<ServiceRef>>;

    /// Short backend name used in logs
    fn driver(&self) -> &'static str;
}
