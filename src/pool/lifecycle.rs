use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a services pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    /// Constructed, never started
    Created = 0,
    /// Discovery loop running
    Running = 1,
    /// Closed; may be started again with a fresh stop signal
    Stopped = 2,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Created,
            1 => PoolState::Running,
            _ => PoolState::Stopped,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Created => write!(f, "CREATED"),
            PoolState::Running => write!(f, "RUNNING"),
            PoolState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// State machine guarding start/close. Each activation owns its own stop
/// token, so closing twice is reported instead of signalling twice.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    activation: Mutex<Option<CancellationToken>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PoolState::Created as u8),
            activation: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Enter `Running`, returning the stop token of the new activation.
    /// Fails with the current state if already running.
    pub fn begin(&self) -> Result<CancellationToken, PoolState> {
        let mut activation = self.activation.lock();
        if activation.is_some() {
            return Err(self.state());
        }

        let token = CancellationToken::new();
        *activation = Some(token.clone());
        self.state.store(PoolState::Running as u8, Ordering::Release);
        Ok(token)
    }

    /// Enter `Stopped` and fire the stop token of the current activation.
    /// Fails with the current state if not running.
    pub fn end(&self) -> Result<(), PoolState> {
        let mut activation = self.activation.lock();
        let token = activation.take().ok_or_else(|| self.state())?;

        self.state.store(PoolState::Stopped as u8, Ordering::Release);
        token.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), PoolState::Created);
        assert_eq!(lifecycle.end(), Err(PoolState::Created));

        let token = lifecycle.begin().unwrap();
        assert_eq!(lifecycle.state(), PoolState::Running);
        assert!(matches!(lifecycle.begin(), Err(PoolState::Running)));

        lifecycle.end().unwrap();
        assert!(token.is_cancelled());
        assert_eq!(lifecycle.state(), PoolState::Stopped);
        assert_eq!(lifecycle.end(), Err(PoolState::Stopped));
    }

    #[test]
    fn test_restart_gets_fresh_token() {
        let lifecycle = Lifecycle::new();
        let first = lifecycle.begin().unwrap();
        lifecycle.end().unwrap();

        let second = lifecycle.begin().unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(lifecycle.state(), PoolState::Running);
    }
}
