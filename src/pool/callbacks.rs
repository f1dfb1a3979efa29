//! Caller supplied hooks invoked by the discovery loop
//!
//! Every hook is optional and is checked for presence before it is invoked.
//! Hooks run synchronously on the discovery task, so a slow hook delays the
//! next reconciliation cycle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::service::ServiceRef;

/// Fallible hook run after a discovered service was mutated
pub type OnNewDiscovery = Arc<dyn Fn(&ServiceRef) -> anyhow::Result<()> + Send + Sync>;

/// Hook run after a service was evicted from either partition
pub type OnDiscoveryRemove = Arc<dyn Fn(&ServiceRef) + Send + Sync>;

/// Hook run once per activation, after the first discovery attempt
pub type OnDiscoveryCompleted = Arc<dyn Fn() + Send + Sync>;

/// Predicate forcing a refresh of an already pooled service
pub type MutationNeeded = Arc<dyn Fn(&ServiceRef) -> bool + Send + Sync>;

type MutationFuture = Pin<Box<dyn Future<Output = anyhow::Result<ServiceRef>> + Send>>;

/// Transforms a raw discovered record into a pool-usable service, for
/// example by dialing it and returning a connection-bearing wrapper.
#[derive(Clone)]
pub struct MutationFn {
    inner: Arc<dyn Fn(ServiceRef) -> MutationFuture + Send + Sync>,
}

impl MutationFn {
    /// Wrap an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ServiceRef) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ServiceRef>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |srv| Box::pin(f(srv))),
        }
    }

    /// Keep discovered records as they are
    pub fn identity() -> Self {
        Self::new(|srv| async move { Ok(srv) })
    }

    pub async fn call(&self, srv: ServiceRef) -> anyhow::Result<ServiceRef> {
        (self.inner)(srv).await
    }
}

impl fmt::Debug for MutationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationFn")
            .field("inner", &"<function>")
            .finish()
    }
}

/// Registered hooks of a pool
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub on_new_discovery: Option<OnNewDiscovery>,
    pub on_remove: Option<OnDiscoveryRemove>,
    pub on_completed: Option<OnDiscoveryCompleted>,
    pub mutation_needed: Option<MutationNeeded>,
}

impl Callbacks {
    pub fn mutation_needed(&self, srv: &ServiceRef) -> bool {
        self.mutation_needed.as_ref().is_some_and(|f| f(srv))
    }

    pub fn removed(&self, srv: &ServiceRef) {
        if let Some(f) = &self.on_remove {
            f(srv);
        }
    }

    pub fn new_discovery(&self, srv: &ServiceRef) -> anyhow::Result<()> {
        match &self.on_new_discovery {
            Some(f) => f(srv),
            None => Ok(()),
        }
    }

    pub fn completed(&self) {
        if let Some(f) = &self.on_completed {
            f();
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_new_discovery", &self.on_new_discovery.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("mutation_needed", &self.mutation_needed.is_some())
            .finish()
    }
}
