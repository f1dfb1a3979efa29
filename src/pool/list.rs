//! Membership list of a services pool
//!
//! Keeps two disjoint partitions of discovered services:
//! - **healthy**: ordered, selectable in round-robin order
//! - **jailed**: keyed by identity, excluded from selection until a health
//!   check releases them
//!
//! A background health-check loop moves services between the partitions.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::ServiceRef;

/// Operations the pool needs from a membership list. Implementations own
/// their synchronization; every method may be called concurrently with the
/// health-check loop and with selection.
#[async_trait]
pub trait MembershipList: Send + Sync {
    /// Snapshot of the healthy partition, in selection order
    fn healthy(&self) -> Vec<ServiceRef>;

    /// Snapshot of the jailed partition
    fn jailed(&self) -> HashMap<String, ServiceRef>;

    fn remove_from_healthy_by_index(&self, index: usize) -> Option<ServiceRef>;

    fn remove_from_jail(&self, srv: &ServiceRef) -> Option<ServiceRef>;

    /// Whether the identity is present in either partition
    fn is_service_exists(&self, srv: &ServiceRef) -> bool;

    /// Insert into the healthy partition; ignored if the identity exists
    fn add(&self, srv: ServiceRef);

    /// Next healthy service in round-robin order
    fn next(&self) -> Option<ServiceRef>;

    /// Randomize the order of the healthy partition
    fn shuffle(&self);

    /// Run health checks until the list is closed
    async fn health_checks_loop(&self);

    /// Release resources and stop the health-check loop
    fn close(&self);

    /// Remove a healthy service by identity
    fn remove_from_healthy(&self, id: &str) -> Option<ServiceRef> {
        let index = self.healthy().iter().position(|srv| srv.id() == id)?;
        self.remove_from_healthy_by_index(index)
    }
}

/// Configuration of the default membership list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Pause between two health-check rounds
    pub check_interval: Duration,
    /// Failed checks a jailed service gets before it is dropped (0 keeps it forever)
    pub try_up_tries: u32,
    /// Upper bound of a single health check
    pub check_timeout: Duration,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            try_up_tries: 3,
            check_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
struct JailedEntry {
    service: ServiceRef,
    failed_tries: u32,
}

#[derive(Debug, Default)]
struct ListState {
    healthy: Vec<ServiceRef>,
    jailed: HashMap<String, JailedEntry>,
}

impl ListState {
    fn contains(&self, id: &str) -> bool {
        self.jailed.contains_key(id) || self.healthy.iter().any(|srv| srv.id() == id)
    }
}

/// Default [`MembershipList`] implementation
#[derive(Debug)]
pub struct ServicesList {
    name: String,
    opts: ListOptions,
    state: RwLock<ListState>,
    cursor: AtomicUsize,
    cancel: Mutex<CancellationToken>,
}

impl ServicesList {
    pub fn new<N: Into<String>>(name: N, opts: Option<ListOptions>) -> Self {
        Self {
            name: name.into(),
            opts: opts.unwrap_or_default(),
            state: RwLock::new(ListState::default()),
            cursor: AtomicUsize::new(0),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn options(&self) -> &ListOptions {
        &self.opts
    }

    /// Number of jailed services
    pub fn jailed_count(&self) -> usize {
        self.state.read().jailed.len()
    }

    async fn probe(&self, srv: &ServiceRef) -> bool {
        match tokio::time::timeout(self.opts.check_timeout, srv.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(service = %self.name, id = %srv.id(), error = %e, "health check failed");
                false
            }
            Err(_) => {
                debug!(service = %self.name, id = %srv.id(), timeout = ?self.opts.check_timeout, "health check timed out");
                false
            }
        }
    }

    /// Run one round of health checks over both partitions
    pub async fn check_all(&self) {
        self.check_healthy().await;
        self.check_jailed().await;
    }

    async fn check_healthy(&self) {
        let healthy = self.healthy();
        let results = join_all(healthy.iter().map(|srv| self.probe(srv))).await;

        let failed: Vec<&ServiceRef> = healthy
            .iter()
            .zip(results)
            .filter(|(_, ok)| !ok)
            .map(|(srv, _)| srv)
            .collect();
        if failed.is_empty() {
            return;
        }

        let mut state = self.state.write();
        for srv in failed {
            let Some(index) = state.healthy.iter().position(|s| s.id() == srv.id()) else {
                continue;
            };
            let service = state.healthy.remove(index);
            warn!(service = %self.name, id = %service.id(), "service jailed");
            state.jailed.insert(
                service.id().to_string(),
                JailedEntry {
                    service,
                    failed_tries: 0,
                },
            );
        }
    }

    async fn check_jailed(&self) {
        let jailed: Vec<ServiceRef> = self
            .state
            .read()
            .jailed
            .values()
            .map(|entry| entry.service.clone())
            .collect();
        if jailed.is_empty() {
            return;
        }

        let results = join_all(jailed.iter().map(|srv| self.probe(srv))).await;

        let mut state = self.state.write();
        for (srv, ok) in jailed.iter().zip(results) {
            if ok {
                let Some(entry) = state.jailed.remove(srv.id()) else {
                    continue;
                };
                info!(service = %self.name, id = %srv.id(), "service released from jail");
                state.healthy.push(entry.service);
                continue;
            }

            let Some(entry) = state.jailed.get_mut(srv.id()) else {
                continue;
            };
            entry.failed_tries += 1;
            if self.opts.try_up_tries > 0 && entry.failed_tries >= self.opts.try_up_tries {
                warn!(
                    service = %self.name,
                    id = %srv.id(),
                    tries = entry.failed_tries,
                    "service dropped after failed health checks"
                );
                state.jailed.remove(srv.id());
            }
        }
    }
}

#[async_trait]
impl MembershipList for ServicesList {
    fn healthy(&self) -> Vec<ServiceRef> {
        self.state.read().healthy.clone()
    }

    fn jailed(&self) -> HashMap<String, ServiceRef> {
        self.state
            .read()
            .jailed
            .iter()
            .map(|(id, entry)| (id.clone(), entry.service.clone()))
            .collect()
    }

    fn remove_from_healthy_by_index(&self, index: usize) -> Option<ServiceRef> {
        let mut state = self.state.write();
        if index >= state.healthy.len() {
            return None;
        }
        Some(state.healthy.remove(index))
    }

    fn remove_from_jail(&self, srv: &ServiceRef) -> Option<ServiceRef> {
        self.state
            .write()
            .jailed
            .remove(srv.id())
            .map(|entry| entry.service)
    }

    fn is_service_exists(&self, srv: &ServiceRef) -> bool {
        self.state.read().contains(srv.id())
    }

    fn add(&self, srv: ServiceRef) {
        let mut state = self.state.write();
        if state.contains(srv.id()) {
            debug!(service = %self.name, id = %srv.id(), "service already listed");
            return;
        }
        debug!(service = %self.name, id = %srv.id(), address = %srv.address(), "service added");
        state.healthy.push(srv);
    }

    fn next(&self) -> Option<ServiceRef> {
        let state = self.state.read();
        if state.healthy.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % state.healthy.len();
        Some(state.healthy[index].clone())
    }

    fn shuffle(&self) {
        self.state.write().healthy.shuffle(&mut rand::thread_rng());
    }

    async fn health_checks_loop(&self) {
        let cancel = self.cancel.lock().clone();
        info!(service = %self.name, interval = ?self.opts.check_interval, "start health checks loop");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.opts.check_interval) => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.check_all() => {}
            }
        }

        info!(service = %self.name, "stop health checks loop");
    }

    fn close(&self) {
        let mut cancel = self.cancel.lock();
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    fn remove_from_healthy(&self, id: &str) -> Option<ServiceRef> {
        let mut state = self.state.write();
        let index = state.healthy.iter().position(|srv| srv.id() == id)?;
        Some(state.healthy.remove(index))
    }
}
