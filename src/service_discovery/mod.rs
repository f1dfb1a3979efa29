//! Service discovery module
//!
//! Discovery providers translate a service name into the current snapshot of
//! its active instances:
//! - Consul: passing instances from the agent health endpoint
//! - Static: an in-memory snapshot that can be replaced at runtime

#[cfg(feature = "consul-discovery")]
pub mod consul;
pub mod fixed;
pub mod traits;
pub mod transport;


// Re-export public types for convenience
pub use traits::{DiscoveryError, DiscoveryResult, ServiceDiscovery};
pub use transport::{join_path, DiscoveryOptions, TransportProtocol};

#[cfg(feature = "consul-discovery")]
pub use consul::ConsulServiceDiscovery;
pub use fixed::StaticServiceDiscovery;
