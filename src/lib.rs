//! # service-pool - client-side pool of discovered service instances
//!
//! Keeps an up-to-date set of reachable instances of one named service and
//! hands them out in round-robin order.
//!
//! ## Core pieces
//!
//! - **Discovery**: pluggable providers ([`ServiceDiscovery`]) returning the
//!   current instances of a service; Consul and a static provider are built in
//! - **Reconciliation**: a background loop evicts vanished instances and adds
//!   new ones, passing them through a caller-supplied mutation function
//! - **Membership**: healthy and jailed partitions with a health-check loop
//! - **Hooks**: callbacks on new, removed and first-completed discovery
//!
//! ## Example
//!
//! ```rust,no_run
//! use service_pool::{config::Config, pool::{MutationFn, ServicesPool}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file_with_env("config/service-pool.toml").await?;
//!     let discovery = config.build_discovery()?;
//!     let pool = ServicesPool::new(config.pool_options(discovery, MutationFn::identity()));
//!
//!     pool.start(config.pool.health_checks)?;
//!     if let Some(srv) = pool.next_service() {
//!         println!("calling {}", srv.address());
//!     }
//!     pool.close()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod service;
pub mod service_discovery;

// Re-export commonly used types
pub use error::{PoolError, PoolResult};
pub use pool::{
    ListOptions, MembershipList, MutationFn, PoolOptions, PoolState, ServicesList, ServicesPool,
};
pub use service::{BaseService, Service, ServiceRef};
pub use service_discovery::{
    DiscoveryError, DiscoveryOptions, ServiceDiscovery, StaticServiceDiscovery, TransportProtocol,
};

#[cfg(feature = "consul-discovery")]
pub use service_discovery::ConsulServiceDiscovery;
