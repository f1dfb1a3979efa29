use thiserror::Error;

use crate::service_discovery::DiscoveryError;

/// Main error type for the services pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// Discovery provider failed or found nothing; membership is left untouched
    #[error("error discovering {service} active: {source}")]
    Discovery {
        service: String,
        #[source]
        source: DiscoveryError,
    },

    /// A record has to be mutated but the pool has no mutation function
    #[error("services pool {service} has no mutation function configured")]
    MissingMutation { service: String },

    /// Caller supplied mutation function failed for a record
    #[error("mutate discovered service {id}: {message}")]
    Mutation { id: String, message: String },

    /// New-discovery callback failed
    #[error("callback on new discovered service {id}: {message}")]
    Callback { id: String, message: String },

    /// `start` called on a pool that is already running
    #[error("services pool {service} is already running")]
    AlreadyRunning { service: String },

    /// `close` called on a pool that is not running
    #[error("services pool {service} is not running (state: {state})")]
    NotRunning { service: String, state: String },
}

impl PoolError {
    /// Create a discovery error for the given service
    pub fn discovery<S: Into<String>>(service: S, source: DiscoveryError) -> Self {
        Self::Discovery {
            service: service.into(),
            source,
        }
    }

    /// Create a mutation error
    pub fn mutation<I: Into<String>>(id: I, err: &anyhow::Error) -> Self {
        Self::Mutation {
            id: id.into(),
            message: format!("{:#}", err),
        }
    }

    /// Create a callback error
    pub fn callback<I: Into<String>>(id: I, err: &anyhow::Error) -> Self {
        Self::Callback {
            id: id.into(),
            message: format!("{:#}", err),
        }
    }

    /// True when discovery succeeded but returned no instances
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::Discovery { source, .. } if source.is_not_found())
    }
}

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
