use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::callbacks::{Callbacks, MutationFn};
use super::lifecycle::{Lifecycle, PoolState};
use super::list::{ListOptions, MembershipList, ServicesList};
use crate::error::{PoolError, PoolResult};
use crate::service::ServiceRef;
use crate::service_discovery::{DiscoveryError, ServiceDiscovery};

/// Default pause between two discovery cycles
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);

/// Options to configure a [`ServicesPool`]
pub struct PoolOptions {
    /// Service name to discover
    pub name: String,
    pub discovery: Arc<dyn ServiceDiscovery>,
    /// Pause between two discovery cycles
    pub discovery_interval: Duration,
    /// Configuration of the default membership list
    pub list_options: Option<ListOptions>,
    /// Turns raw discovered records into pool-usable services
    pub mutation: Option<MutationFn>,
    /// Caller built membership list, used instead of the default one
    pub custom_list: Option<Arc<dyn MembershipList>>,
}

impl PoolOptions {
    pub fn new<N: Into<String>>(name: N, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        Self {
            name: name.into(),
            discovery,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            list_options: None,
            mutation: None,
            custom_list: None,
        }
    }

    pub fn discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn list_options(mut self, opts: ListOptions) -> Self {
        self.list_options = Some(opts);
        self
    }

    pub fn mutation(mut self, mutation: MutationFn) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn custom_list(mut self, list: Arc<dyn MembershipList>) -> Self {
        self.custom_list = Some(list);
        self
    }
}

impl std::fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolOptions")
            .field("name", &self.name)
            .field("discovery", &self.discovery.driver())
            .field("discovery_interval", &self.discovery_interval)
            .field("list_options", &self.list_options)
            .field("mutation", &self.mutation.is_some())
            .field("custom_list", &self.custom_list.is_some())
            .finish()
    }
}

struct PoolInner {
    name: String,
    discovery: Arc<dyn ServiceDiscovery>,
    discovery_interval: Duration,
    list: Arc<dyn MembershipList>,
    mutation: Option<MutationFn>,
    callbacks: RwLock<Callbacks>,
    lifecycle: Lifecycle,
    /// Held for a whole reconciliation cycle
    reconcile: tokio::sync::Mutex<()>,
}

/// Pool of reachable active instances of one named service.
///
/// A background loop periodically asks the discovery provider for the current
/// instances and reconciles them with the membership list:
///
/// - instances no longer discovered are evicted from both partitions
/// - new instances are passed through the mutation function and added
/// - instances already pooled are left alone, unless the mutation-needed
///   callback asks for a refresh
///
/// A failed or empty discovery leaves the membership untouched.
///
/// Cloning is cheap; all clones share the same pool.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use service_pool::pool::{MutationFn, PoolOptions, ServicesPool};
/// use service_pool::service_discovery::StaticServiceDiscovery;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let discovery = Arc::new(StaticServiceDiscovery::new());
/// let pool = ServicesPool::new(
///     PoolOptions::new("billing", discovery)
///         .discovery_interval(Duration::from_secs(5))
///         .mutation(MutationFn::identity()),
/// );
///
/// pool.start(true)?;
/// if let Some(srv) = pool.next_service() {
///     println!("using {}", srv.address());
/// }
/// pool.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServicesPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ServicesPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesPool")
            .field("name", &self.inner.name)
            .field("discovery", &self.inner.discovery.driver())
            .field("discovery_interval", &self.inner.discovery_interval)
            .field("state", &self.inner.lifecycle.state())
            .field("callbacks", &*self.inner.callbacks.read())
            .finish()
    }
}

impl ServicesPool {
    /// Create a new pool. Performs no I/O; a default membership list is
    /// built unless a custom one is supplied.
    pub fn new(opts: PoolOptions) -> Self {
        let list = opts.custom_list.unwrap_or_else(|| {
            Arc::new(ServicesList::new(opts.name.clone(), opts.list_options)) as Arc<dyn MembershipList>
        });

        Self {
            inner: Arc::new(PoolInner {
                name: opts.name,
                discovery: opts.discovery,
                discovery_interval: opts.discovery_interval,
                list,
                mutation: opts.mutation,
                callbacks: RwLock::new(Callbacks::default()),
                lifecycle: Lifecycle::new(),
                reconcile: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> PoolState {
        self.inner.lifecycle.state()
    }

    /// Spawn the discovery loop and, if requested, the list's health-check
    /// loop. Must be called from within a tokio runtime.
    ///
    /// Allowed from `Created` and `Stopped`; every activation gets its own
    /// stop signal and its own one-time shuffle.
    pub fn start(&self, health_checks: bool) -> PoolResult<()> {
        if self.inner.mutation.is_none() {
            return Err(PoolError::MissingMutation {
                service: self.inner.name.clone(),
            });
        }

        let stop = self
            .inner
            .lifecycle
            .begin()
            .map_err(|_| PoolError::AlreadyRunning {
                service: self.inner.name.clone(),
            })?;

        tokio::spawn(self.clone().discover_services_loop(stop.clone()));

        if health_checks {
            let list = Arc::clone(&self.inner.list);
            tokio::spawn(async move {
                tokio::select! {
                    _ = list.health_checks_loop() => {}
                    _ = stop.cancelled() => {}
                }
            });
        }

        Ok(())
    }

    /// Run one reconciliation cycle: discover, evict stale services, mutate
    /// and add new ones.
    ///
    /// Returns the discovery error without touching the membership list when
    /// the provider fails or finds nothing. Mutation and callback failures
    /// are logged and only skip the affected service.
    ///
    /// Cycles never overlap: a call made while another cycle runs waits for
    /// it. Dropping the returned future abandons the cycle at its next await.
    pub async fn discover_services(&self) -> PoolResult<()> {
        let inner = &self.inner;
        let mutation = inner
            .mutation
            .as_ref()
            .ok_or_else(|| PoolError::MissingMutation {
                service: inner.name.clone(),
            })?;

        let _cycle = inner.reconcile.lock().await;

        let new_services = inner
            .discovery
            .discover(&inner.name)
            .await
            .map_err(|e| PoolError::discovery(inner.name.clone(), e))?;

        // An empty snapshot counts as not found, whatever the provider says
        if new_services.is_empty() {
            return Err(PoolError::discovery(
                inner.name.clone(),
                DiscoveryError::not_found(inner.name.as_str()),
            ));
        }

        let callbacks = inner.callbacks.read().clone();

        let discovered_ids: HashSet<&str> = new_services.iter().map(|srv| srv.id()).collect();
        let evicted = self.evict_stale(&discovered_ids, &callbacks);
        if evicted > 0 {
            info!(service = %inner.name, evicted, "evicted services missing from discovery");
        }

        for new_service in new_services {
            // Mutation may open network resources, so pooled services are
            // only mutated again when the caller asks for it.
            let exists = inner.list.is_service_exists(&new_service);
            if exists && !callbacks.mutation_needed(&new_service) {
                continue;
            }

            let mutated = match mutation.call(Arc::clone(&new_service)).await {
                Ok(mutated) => mutated,
                Err(e) => {
                    warn!(
                        service = %inner.name,
                        error = %PoolError::mutation(new_service.id(), &e),
                        "skipping discovered service"
                    );
                    continue;
                }
            };

            if let Err(e) = callbacks.new_discovery(&mutated) {
                warn!(
                    service = %inner.name,
                    error = %PoolError::callback(mutated.id(), &e),
                    "new discovery callback failed"
                );
            }

            if exists {
                debug!(service = %inner.name, id = %mutated.id(), "refreshed pooled service");
                continue;
            }

            debug!(service = %inner.name, id = %mutated.id(), address = %mutated.address(), "adding discovered service");
            inner.list.add(mutated);
        }

        Ok(())
    }

    /// Remove every pooled service whose identity was not discovered
    fn evict_stale(&self, discovered_ids: &HashSet<&str>, callbacks: &Callbacks) -> usize {
        let list = &self.inner.list;
        let mut evicted = 0;

        for srv in list.healthy() {
            if discovered_ids.contains(srv.id()) {
                continue;
            }
            if let Some(removed) = list.remove_from_healthy(srv.id()) {
                debug!(service = %self.inner.name, id = %removed.id(), "evicted healthy service");
                callbacks.removed(&removed);
                evicted += 1;
            }
        }

        for (id, srv) in list.jailed() {
            if discovered_ids.contains(id.as_str()) {
                continue;
            }
            if let Some(removed) = list.remove_from_jail(&srv) {
                debug!(service = %self.inner.name, id = %id, "evicted jailed service");
                callbacks.removed(&removed);
                evicted += 1;
            }
        }

        evicted
    }

    /// Next healthy service in round-robin order, `None` when the pool is empty
    pub fn next_service(&self) -> Option<ServiceRef> {
        self.inner.list.next()
    }

    /// Number of healthy services
    pub fn count(&self) -> usize {
        self.inner.list.healthy().len()
    }

    /// Membership list backing this pool
    pub fn list(&self) -> Arc<dyn MembershipList> {
        Arc::clone(&self.inner.list)
    }

    /// Close the membership list and stop the discovery loop. A cycle in
    /// flight is abandoned at its next await point.
    ///
    /// Closing a pool that is not running is reported as
    /// [`PoolError::NotRunning`].
    pub fn close(&self) -> PoolResult<()> {
        self.inner
            .lifecycle
            .end()
            .map_err(|state| PoolError::NotRunning {
                service: self.inner.name.clone(),
                state: state.to_string(),
            })?;

        self.inner.list.close();
        info!(service = %self.inner.name, "services pool closed");
        Ok(())
    }

    pub fn set_on_new_disc_callback<F>(&self, f: F)
    where
        F: Fn(&ServiceRef) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.callbacks.write().on_new_discovery = Some(Arc::new(f));
    }

    pub fn set_on_disc_remove_callback<F>(&self, f: F)
    where
        F: Fn(&ServiceRef) + Send + Sync + 'static,
    {
        self.inner.callbacks.write().on_remove = Some(Arc::new(f));
    }

    pub fn set_on_disc_completed_callback<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.write().on_completed = Some(Arc::new(f));
    }

    pub fn set_mutation_needed_callback<F>(&self, f: F)
    where
        F: Fn(&ServiceRef) -> bool + Send + Sync + 'static,
    {
        self.inner.callbacks.write().mutation_needed = Some(Arc::new(f));
    }

    async fn discover_services_loop(self, stop: CancellationToken) {
        let name = self.inner.name.clone();
        info!(service = %name, interval = ?self.inner.discovery_interval, "start discovery loop");

        // Shuffle once per activation so pools across a fleet do not all
        // start from the same round-robin order.
        let mut once_shuffled = false;
        loop {
            if stop.is_cancelled() {
                break;
            }

            // Close abandons an in-flight cycle
            tokio::select! {
                _ = stop.cancelled() => break,
                result = self.discover_services() => {
                    if let Err(e) = result {
                        warn!(service = %name, error = %e, "error discovery services");
                    }
                }
            }

            if !once_shuffled {
                self.inner.list.shuffle();
                once_shuffled = true;

                let completed = self.inner.callbacks.read().clone();
                completed.completed();
            }

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.inner.discovery_interval) => {}
            }
        }

        info!(service = %name, "stop discovery loop");
    }
}
