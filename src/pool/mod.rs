//! # Services pool
//!
//! Keeps a live, health-partitioned list of the active instances of one named
//! service and hands out instances in round-robin order.
//!
//! - [`ServicesPool`]: discovery loop, reconciliation and lifecycle
//! - [`MembershipList`] / [`ServicesList`]: healthy and jailed partitions with
//!   their own health-check loop
//! - [`MutationFn`] and the callback types: caller hooks run by the discovery
//!   loop

pub mod callbacks;
pub mod lifecycle;
pub mod list;
pub mod services_pool;


pub use callbacks::{
    MutationFn, MutationNeeded, OnDiscoveryCompleted, OnDiscoveryRemove, OnNewDiscovery,
};
pub use lifecycle::PoolState;
pub use list::{ListOptions, MembershipList, ServicesList};
pub use services_pool::{PoolOptions, ServicesPool, DEFAULT_DISCOVERY_INTERVAL};
